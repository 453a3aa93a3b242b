//! [`MediaSession`]: the `souvlaki` media controls on their own OS thread.
//!
//! The platform controls are created, attached and updated on the
//! `media-session` thread only.  Updates reach it over a std channel;
//! dropping the [`MediaSession`] closes that channel and the thread exits.

use std::sync::mpsc as std_mpsc;
use std::sync::PoisonError;

use souvlaki::{MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, PlatformConfig};
use tokio::sync::mpsc;

use super::{command_for, MediaUpdate, NowPlaying, TransportRequest};
use crate::coordinator::{SharedState, UiCommand};

const DISPLAY_NAME: &str = "Focus Radio";
const DBUS_NAME: &str = "focus_radio";

pub struct MediaSession {
    updates: std_mpsc::Sender<MediaUpdate>,
}

impl MediaSession {
    /// Spawn the media-session thread.  OS requests become commands on
    /// `commands`; `state` tells play from pause.
    pub fn start(commands: mpsc::Sender<UiCommand>, state: SharedState) -> Self {
        let (updates, rx) = std_mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("media-session".into())
            .spawn(move || run(rx, commands, state));
        if let Err(e) = spawned {
            log::warn!("media session thread not started: {e}");
        }
        Self { updates }
    }
}

impl NowPlaying for MediaSession {
    fn publish(&self, update: MediaUpdate) {
        // Fails only once the thread has given up; nothing to report then.
        let _ = self.updates.send(update);
    }
}

/// Transport requests the radio understands.
fn request_for(event: &MediaControlEvent) -> Option<TransportRequest> {
    match event {
        MediaControlEvent::Play => Some(TransportRequest::Play),
        MediaControlEvent::Pause | MediaControlEvent::Stop => Some(TransportRequest::Pause),
        MediaControlEvent::Toggle => Some(TransportRequest::Toggle),
        _ => None,
    }
}

fn run(
    updates: std_mpsc::Receiver<MediaUpdate>,
    commands: mpsc::Sender<UiCommand>,
    state: SharedState,
) {
    // The Windows controls need the window's HWND, which eframe does not
    // hand out here.
    if cfg!(target_os = "windows") {
        log::info!("media session not available on this platform");
        return;
    }

    let config = PlatformConfig {
        display_name: DISPLAY_NAME,
        dbus_name: DBUS_NAME,
        hwnd: None,
    };
    let mut controls = match MediaControls::new(config) {
        Ok(controls) => controls,
        Err(e) => {
            log::warn!("media session unavailable: {e:?}");
            return;
        }
    };

    let attached = controls.attach(move |event: MediaControlEvent| {
        let Some(request) = request_for(&event) else {
            return;
        };
        let playing = state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_playing;
        if let Some(command) = command_for(request, playing) {
            log::debug!("media session: {request:?}");
            if let Err(e) = commands.try_send(command) {
                log::warn!("media session command dropped: {e}");
            }
        }
    });
    if let Err(e) = attached {
        log::warn!("media session handlers not attached: {e:?}");
        return;
    }
    log::info!("media session attached");

    for update in updates {
        let result = match &update {
            MediaUpdate::Track { artist, title } => controls.set_metadata(MediaMetadata {
                title: Some(title.as_str()).filter(|t| !t.is_empty()),
                artist: Some(artist.as_str()).filter(|a| !a.is_empty()),
                album: Some(DISPLAY_NAME),
                ..Default::default()
            }),
            MediaUpdate::Playback(true) => {
                controls.set_playback(MediaPlayback::Playing { progress: None })
            }
            MediaUpdate::Playback(false) => {
                controls.set_playback(MediaPlayback::Paused { progress: None })
            }
        };
        if let Err(e) = result {
            log::debug!("media session update {update:?} failed: {e:?}");
        }
    }
    log::debug!("media session closed");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
