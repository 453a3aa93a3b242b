//! OS media-session integration: the "now playing" card and the play/pause
//! keys of the desktop, backed by `souvlaki`.
//!
//! # Design
//!
//! The coordinator publishes [`MediaUpdate`]s through the [`NowPlaying`]
//! trait; it never talks to the OS itself.  [`MediaSession`] implements the
//! trait by forwarding updates to a **dedicated OS thread** that owns the
//! platform controls, and turns transport requests coming back from the OS
//! into [`UiCommand::TogglePlay`].
//!
//! A platform without a media session (no D-Bus session bus, no window
//! handle) logs a warning once; the rest of the app is unaffected.

pub mod session;

pub use session::MediaSession;

use crate::coordinator::UiCommand;

// ---------------------------------------------------------------------------
// MediaUpdate / NowPlaying
// ---------------------------------------------------------------------------

/// What the OS is told about the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaUpdate {
    /// Either field may be empty.
    Track { artist: String, title: String },
    /// `true` while the radio is playing.
    Playback(bool),
}

/// Sink for [`MediaUpdate`]s.
pub trait NowPlaying: Send + Sync {
    fn publish(&self, update: MediaUpdate);
}

// ---------------------------------------------------------------------------
// TransportRequest
// ---------------------------------------------------------------------------

/// A play/pause request from the OS (media keys, lock screen, applets).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportRequest {
    Play,
    Pause,
    Toggle,
}

/// The command that honours `request`, given whether the radio is playing.
/// `None` when the radio is already in the requested state.
///
/// ```
/// use pomodoro_radio::coordinator::UiCommand;
/// use pomodoro_radio::media::{command_for, TransportRequest};
///
/// assert_eq!(command_for(TransportRequest::Play, false), Some(UiCommand::TogglePlay));
/// assert_eq!(command_for(TransportRequest::Play, true), None);
/// ```
pub fn command_for(request: TransportRequest, playing: bool) -> Option<UiCommand> {
    let toggle = match request {
        TransportRequest::Play => !playing,
        TransportRequest::Pause => playing,
        TransportRequest::Toggle => true,
    };
    toggle.then_some(UiCommand::TogglePlay)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
