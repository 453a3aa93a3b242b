//! Pomodoro timer: phase machine, countdown schedule and readout formatting.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use pomodoro_radio::config::TimerConfig;
//! use pomodoro_radio::timer::{TimerEngine, TimerEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (timer, mut events) = TimerEngine::from_config(&TimerConfig::default());
//!     timer.start();
//!
//!     while let Some(event) = events.recv().await {
//!         if let TimerEvent::PhaseChanged(t) = event {
//!             println!("{} → {}: play {:?}", t.from.label(), t.to.label(), t.cue);
//!         }
//!     }
//! }
//! ```

pub mod engine;
pub mod format;
pub mod state;

pub use engine::{TimerEngine, TimerEvent};
pub use format::format_clock;
pub use state::{Cue, Phase, PhaseTransition, TimerSettings, TimerState};
