//! Audio engine: sample decoding → mixing graph → output device.
//!
//! # Graph
//!
//! ```text
//! assets/*.wav → decode_bytes → SampleData cache ─┬─ rain / vinyl loops ─┐
//!                                                 └─ ding / alarm cues ──┤
//! radio stream → PacketDecoder → MusicInput feed ─────────────────────────┼─→ AudioGraph → cpal
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pomodoro_radio::audio::{AudioEngine, CpalOutput, Lane, CUE_DING};
//! use pomodoro_radio::config::AudioConfig;
//!
//! let engine = AudioEngine::new(AudioConfig::default(), Box::new(CpalOutput::new()));
//! engine.resume().expect("audio output");
//! engine.set_gain(Lane::Rain, 0.3);
//! engine.toggle(Lane::Rain).ok();
//! engine.play_cue(CUE_DING);
//! ```

pub mod buffer;
pub mod decode;
pub mod engine;
pub mod graph;
pub mod output;
pub mod resample;

pub use buffer::RingBuffer;
pub use decode::{decode_bytes, extension_for_mime, DecodeError, DecodedAudio, PacketDecoder};
pub use engine::{AudioEngine, AudioError, ContextState, MusicInput};
pub use graph::{
    AudioGraph, FeedId, GraphError, Lane, LaneState, OutputFormat, SampleData, SharedGraph,
    SourceId,
};
pub use output::{CpalOutput, NullOutput, OutputBackend, OutputError, OutputHandle};
pub use resample::{remix_channels, resample_buffer, ResampleError, StreamResampler};

/// Looped on the rain lane.
pub const SAMPLE_RAIN: &str = "rain";
/// Looped on the vinyl lane.
pub const SAMPLE_VINYL: &str = "vinyl";
/// Phase-change chime.
pub const CUE_DING: &str = "ding";
/// End-of-break alarm.
pub const CUE_ALARM: &str = "alarmbeep";
