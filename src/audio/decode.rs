//! Audio decoding via `symphonia`.
//!
//! [`PacketDecoder`] walks a container packet by packet and yields
//! interleaved `f32` chunks; it serves both the one-shot sample loader
//! ([`decode_bytes`]) and the live radio stream, which feeds it from a
//! channel-backed reader.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// Errors that can occur while opening or decoding audio.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported or corrupt audio: {0}")]
    Format(#[from] SymphoniaError),

    #[error("no audio track found")]
    NoTrack,

    #[error("decoded audio is empty")]
    Empty,
}

// ---------------------------------------------------------------------------
// DecodedAudio
// ---------------------------------------------------------------------------

/// Interleaved PCM at the source's native rate and layout.
#[derive(Debug, Clone, Default)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// PacketDecoder
// ---------------------------------------------------------------------------

/// Incremental decoder over any symphonia [`MediaSource`].
pub struct PacketDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
}

impl PacketDecoder {
    /// Probe `source` and set up a decoder for its first audio track.
    ///
    /// `extension` (e.g. `"mp3"`, `"wav"`) speeds up probing but is optional.
    pub fn open(
        source: Box<dyn MediaSource>,
        extension: Option<&str>,
    ) -> Result<Self, DecodeError> {
        let mss = MediaSourceStream::new(source, MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoTrack)?;
        let track_id = track.id;

        let decoder =
            symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        Ok(Self {
            format,
            decoder,
            track_id,
        })
    }

    /// Decode the next packet of the selected track.
    ///
    /// Returns `Ok(None)` at end of stream.  Corrupt frames are logged and
    /// skipped.
    pub fn next_chunk(&mut self) -> Result<Option<DecodedAudio>, DecodeError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    return Ok(Some(DecodedAudio {
                        samples: buf.samples().to_vec(),
                        sample_rate: spec.rate,
                        channels: spec.channels.count() as u16,
                    }));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("decode: skipping corrupt frame: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// One-shot helpers
// ---------------------------------------------------------------------------

/// Decode a complete in-memory file.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio, DecodeError> {
    let mut decoder = PacketDecoder::open(Box::new(Cursor::new(bytes)), extension)?;
    let mut out = DecodedAudio::default();

    while let Some(chunk) = decoder.next_chunk()? {
        out.sample_rate = chunk.sample_rate;
        out.channels = chunk.channels;
        out.samples.extend_from_slice(&chunk.samples);
    }

    if out.samples.is_empty() || out.channels == 0 {
        return Err(DecodeError::Empty);
    }
    Ok(out)
}

/// Map an HTTP `Content-Type` onto a probe hint extension.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let mime = mime.to_ascii_lowercase();
    if mime.contains("mpeg") || mime.contains("mp3") {
        Some("mp3")
    } else if mime.contains("aac") {
        Some("aac")
    } else if mime.contains("mp4") || mime.contains("m4a") {
        Some("m4a")
    } else if mime.contains("ogg") || mime.contains("vorbis") {
        Some("ogg")
    } else if mime.contains("wav") {
        Some("wav")
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
