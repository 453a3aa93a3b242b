//! Now-playing metadata over server-sent events.
//!
//! [`MetadataFeed`] keeps one subscription open to the configured endpoint,
//! re-subscribing after `metadata_retry_secs` whenever it drops.  Each SSE
//! event's `data:` payload is parsed with [`parse_now_playing`]; payloads
//! that are not JSON are ignored.

use std::time::Duration;

use reqwest::header::ACCEPT;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::RadioConfig;
use crate::radio::source::RadioError;

const UNKNOWN_TRACK: &str = "Unknown Track";

// ---------------------------------------------------------------------------
// TrackInfo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackInfo {
    /// May be empty.
    pub artist: String,
    /// May be empty.
    pub title: String,
    /// What the UI shows; never empty.
    pub display: String,
}

/// Extract track details from one metadata payload.
///
/// The now-playing object is taken from `now_playing`, then
/// `mount.now_playing`, then the payload itself.  Within it, `artist` falls
/// back to the part of `stream_title` before `" - "`, and `title` to the
/// part after it or to the whole `stream_title`.  The display title falls
/// back to the payload's `streamTitle` and finally to `"Unknown Track"`.
/// Empty strings count as missing.
///
/// Returns `None` only when the payload is not valid JSON.
pub fn parse_now_playing(payload: &str) -> Option<TrackInfo> {
    let data: Value = serde_json::from_str(payload).ok()?;

    let now_playing = present(data.get("now_playing"))
        .or_else(|| present(data.get("mount").and_then(|m| m.get("now_playing"))))
        .unwrap_or(&data);

    let stream_title = text(now_playing.get("stream_title"));
    let mut parts = stream_title.map(|s| s.split(" - "));
    let before = parts.as_mut().and_then(|p| p.next()).filter(|s| !s.is_empty());
    let after = parts.as_mut().and_then(|p| p.next()).filter(|s| !s.is_empty());

    let artist = text(now_playing.get("artist")).or(before).unwrap_or_default().to_string();
    let title = text(now_playing.get("title"))
        .or(after)
        .or(stream_title)
        .unwrap_or_default()
        .to_string();

    let display = if title.is_empty() {
        text(data.get("streamTitle"))
            .unwrap_or(UNKNOWN_TRACK)
            .to_string()
    } else {
        title.clone()
    };

    Some(TrackInfo {
        artist,
        title,
        display,
    })
}

/// A JSON value that is not null, false, zero or the empty string.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

fn text(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// SseDecoder
// ---------------------------------------------------------------------------

/// Incremental `text/event-stream` parser that yields each event's data.
///
/// Bytes may arrive split anywhere, including inside a line or a UTF-8
/// sequence.  Only the `data` field is kept; comments and other fields are
/// skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes; returns the data of every event they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (name, value) = match line.split_once(':') {
                Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            if name == "data" {
                self.data.push(value.to_string());
            }
        }

        events
    }
}

// ---------------------------------------------------------------------------
// MetadataFeed
// ---------------------------------------------------------------------------

/// Background subscription delivering [`TrackInfo`] updates.
///
/// The task ends when the receiver is dropped or the feed is dropped.
pub struct MetadataFeed {
    task: JoinHandle<()>,
}

impl MetadataFeed {
    /// Spawn the subscription loop.  Must be called within a tokio runtime.
    pub fn spawn(config: &RadioConfig, tx: mpsc::UnboundedSender<TrackInfo>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let url = config.metadata_url.clone();
        let retry = Duration::from_secs(config.metadata_retry_secs);

        let task = tokio::spawn(async move {
            loop {
                match subscribe(&client, &url, &tx).await {
                    Ok(()) => log::info!("metadata feed closed; reconnecting in {retry:?}"),
                    Err(e) => log::warn!("metadata feed failed: {e}; retrying in {retry:?}"),
                }
                if tx.is_closed() {
                    return;
                }
                tokio::time::sleep(retry).await;
            }
        });

        Self { task }
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for MetadataFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn subscribe(
    client: &reqwest::Client,
    url: &str,
    tx: &mpsc::UnboundedSender<TrackInfo>,
) -> Result<(), RadioError> {
    let mut response = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(RadioError::Status(status.as_u16()));
    }
    log::debug!("metadata feed connected: {url}");

    let mut decoder = SseDecoder::new();
    while let Some(chunk) = response.chunk().await? {
        for payload in decoder.push(&chunk) {
            match parse_now_playing(&payload) {
                Some(track) => {
                    if tx.send(track).is_err() {
                        return Ok(());
                    }
                }
                None => log::debug!("ignoring malformed metadata payload"),
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
