//! Coordinator: wires UI commands to the timer, audio engine and radio,
//! and keeps the state the window renders.
//!
//! # Architecture
//!
//! ```text
//! UiCommand (mpsc) ─┐
//! TimerEvent ───────┤
//! RadioEvent ───────┼─▶ Coordinator::run()  ← tokio task
//! TrackInfo ────────┘        │
//!                            ├─ AudioEngine  (resume, gains, lanes, cues)
//!                            ├─ RadioSource  (play, pause, rate)
//!                            └─ TimerEngine  (start, stop, reset)
//!
//! SharedState (Arc<Mutex<AppState>>) ←─── read by egui update() each frame
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use pomodoro_radio::audio::{AudioEngine, CpalOutput};
//! use pomodoro_radio::config::AppConfig;
//! use pomodoro_radio::coordinator::{new_shared_state, Coordinator, CoordinatorInputs, UiCommand};
//! use pomodoro_radio::radio::{RadioSource, StreamRadio};
//! use pomodoro_radio::timer::{TimerEngine, TimerSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let audio = Arc::new(AudioEngine::new(config.audio.clone(), Box::new(CpalOutput::new())));
//!     let (radio, radio_rx) = StreamRadio::new(&config.radio, audio.music_input());
//!     let (timer, timer_rx) = TimerEngine::from_config(&config.timer);
//!     let state = new_shared_state(TimerSettings::from(&config.timer), &config.audio);
//!
//!     let (command_tx, command_rx) = mpsc::channel(32);
//!     let (_track_tx, track_rx) = mpsc::unbounded_channel();
//!     let radio: Arc<dyn RadioSource> = Arc::new(radio);
//!     let coordinator = Coordinator::new(state, timer, audio, radio, config.audio.clone());
//!     tokio::spawn(coordinator.run(CoordinatorInputs {
//!         commands: command_rx,
//!         timer: timer_rx,
//!         radio: radio_rx,
//!         tracks: track_rx,
//!     }));
//!
//!     command_tx.send(UiCommand::TogglePlay).await.unwrap();
//! }
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{Coordinator, CoordinatorInputs};
pub use state::{new_shared_state, AppState, PlaybackStatus, SharedState, UiCommand, VERSION_LABEL};
