//! Internet radio: live stream playback and now-playing metadata.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pomodoro_radio::audio::{AudioEngine, CpalOutput};
//! use pomodoro_radio::config::{AudioConfig, RadioConfig};
//! use pomodoro_radio::radio::{MetadataFeed, RadioSource, StreamRadio};
//!
//! #[tokio::main]
//! async fn main() {
//!     let audio = Arc::new(AudioEngine::new(AudioConfig::default(), Box::new(CpalOutput::new())));
//!     audio.resume().expect("audio output");
//!
//!     let config = RadioConfig::default();
//!     let (radio, mut events) = StreamRadio::new(&config, audio.music_input());
//!     radio.play().await.expect("stream");
//!
//!     let (tx, mut tracks) = tokio::sync::mpsc::unbounded_channel();
//!     let _feed = MetadataFeed::spawn(&config, tx);
//!     while let Some(track) = tracks.recv().await {
//!         println!("now playing: {}", track.display);
//!     }
//! #   let _ = events.recv().await;
//! }
//! ```

pub mod metadata;
pub mod source;
pub mod stream;

pub use metadata::{parse_now_playing, MetadataFeed, SseDecoder, TrackInfo};
pub use source::{RadioError, RadioEvent, RadioSource};
pub use stream::StreamRadio;
