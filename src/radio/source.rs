//! The `RadioSource` trait and its event and error types.

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// RadioError
// ---------------------------------------------------------------------------

/// Errors that can occur while connecting to a stream or metadata feed.
#[derive(Debug, Error)]
pub enum RadioError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("stream could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RadioError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RadioError::Timeout
        } else {
            RadioError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// RadioEvent
// ---------------------------------------------------------------------------

/// Playback notifications a source emits on its event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// Connecting, or waiting for the first decoded audio.
    Buffering,
    /// Audio is reaching the music lane.
    Playing,
    Paused,
    /// The stream failed or ended on its own.
    Error(String),
}

// ---------------------------------------------------------------------------
// RadioSource trait
// ---------------------------------------------------------------------------

/// A live stream feeding the music lane.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn RadioSource>`.
#[async_trait]
pub trait RadioSource: Send + Sync {
    /// Connect (or reconnect) and start playback.
    ///
    /// Resolves once the stream has been accepted; audio follows
    /// asynchronously and is announced with [`RadioEvent::Playing`].
    async fn play(&self) -> Result<(), RadioError>;

    /// Stop playback and drop the connection.
    fn pause(&self);

    fn is_paused(&self) -> bool;

    /// Playback speed multiplier applied to audio decoded from now on.
    fn set_playback_rate(&self, rate: f32);

    fn playback_rate(&self) -> f32;
}
