//! Shared application state and the commands the UI sends.
//!
//! [`AppState`] is the single source of truth for everything the window
//! draws: timer readout, playback status, track line, lane switches and
//! slider positions.  The [`Coordinator`](super::Coordinator) mutates it;
//! the egui update loop reads it each frame through [`SharedState`].

use std::sync::{Arc, Mutex};

use crate::audio::Lane;
use crate::config::AudioConfig;
use crate::radio::TrackInfo;
use crate::timer::{format_clock, TimerSettings, TimerState};

/// Shown in the track line while nothing is playing.
pub const VERSION_LABEL: &str = concat!("v", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// UiCommand
// ---------------------------------------------------------------------------

/// User intents, sent from the window to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    /// Play/pause the radio (and with it the timer).
    TogglePlay,
    /// Switch a loop lane on or off.
    ToggleLane(Lane),
    SetVolume(Lane, f32),
    SetSpeed(f32),
    ResetTimer,
}

// ---------------------------------------------------------------------------
// PlaybackStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    /// Nothing attempted yet.
    #[default]
    Ready,
    Buffering,
    Playing,
    Paused,
    /// Audio output or stream start was refused; the user must try again.
    Blocked,
    StreamError,
}

impl PlaybackStatus {
    /// Text for the status line.
    ///
    /// ```
    /// use pomodoro_radio::coordinator::PlaybackStatus;
    ///
    /// assert_eq!(PlaybackStatus::Buffering.label(), "Buffering…");
    /// assert_eq!(PlaybackStatus::Blocked.label(), "Tap to start (autoplay blocked)");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackStatus::Ready => "Ready",
            PlaybackStatus::Buffering => "Buffering…",
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Blocked => "Tap to start (autoplay blocked)",
            PlaybackStatus::StreamError => "Stream error",
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    /// Latest timer snapshot.
    pub timer: TimerState,
    pub timer_settings: TimerSettings,

    pub status: PlaybackStatus,
    /// `true` between a successful play and the next pause or stream error.
    pub is_playing: bool,
    /// Last metadata received, if any.
    pub track: Option<TrackInfo>,

    pub rain_on: bool,
    pub vinyl_on: bool,

    // ── Slider positions ─────────────────────────────────────────────────
    pub music_volume: f32,
    pub rain_volume: f32,
    pub vinyl_volume: f32,
    pub speed: f32,
}

impl AppState {
    pub fn new(timer_settings: TimerSettings, audio: &AudioConfig) -> Self {
        Self {
            timer: TimerState::new(&timer_settings),
            timer_settings,
            status: PlaybackStatus::Ready,
            is_playing: false,
            track: None,
            rain_on: false,
            vinyl_on: false,
            music_volume: audio.music_volume,
            rain_volume: audio.rain_volume,
            vinyl_volume: audio.vinyl_volume,
            speed: audio.default_speed,
        }
    }

    pub fn volume(&self, lane: Lane) -> f32 {
        match lane {
            Lane::Music => self.music_volume,
            Lane::Rain => self.rain_volume,
            Lane::Vinyl => self.vinyl_volume,
        }
    }

    pub fn set_volume(&mut self, lane: Lane, value: f32) {
        match lane {
            Lane::Music => self.music_volume = value,
            Lane::Rain => self.rain_volume = value,
            Lane::Vinyl => self.vinyl_volume = value,
        }
    }

    /// Whether a loop lane is switched on.  Always `false` for music.
    pub fn lane_on(&self, lane: Lane) -> bool {
        match lane {
            Lane::Music => false,
            Lane::Rain => self.rain_on,
            Lane::Vinyl => self.vinyl_on,
        }
    }

    pub fn set_lane_on(&mut self, lane: Lane, on: bool) {
        match lane {
            Lane::Music => {}
            Lane::Rain => self.rain_on = on,
            Lane::Vinyl => self.vinyl_on = on,
        }
    }

    pub fn phase_label(&self) -> &'static str {
        self.timer.phase.label()
    }

    /// `n/total`.
    pub fn period_label(&self) -> String {
        self.timer.period_label(&self.timer_settings)
    }

    /// `MM:SS`.
    pub fn clock(&self) -> String {
        format_clock(self.timer.remaining_secs)
    }

    /// `Now Playing: …` while playing with a known track, the version
    /// otherwise.
    pub fn track_line(&self) -> String {
        match &self.track {
            Some(track) if self.is_playing && !track.display.is_empty() => {
                format!("Now Playing: {}", track.display)
            }
            _ => VERSION_LABEL.to_string(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(TimerSettings::default(), &AudioConfig::default())
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
///
/// Lock for a short critical section; do **not** hold the lock across
/// `.await` points.
pub type SharedState = Arc<Mutex<AppState>>;

pub fn new_shared_state(timer_settings: TimerSettings, audio: &AudioConfig) -> SharedState {
    Arc::new(Mutex::new(AppState::new(timer_settings, audio)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
