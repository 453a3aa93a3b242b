//! Channel remixing and sample-rate conversion for interleaved `f32` audio.
//!
//! Decoded samples and the radio stream arrive at whatever rate and layout
//! the file or server chose; the output device wants its own.  This module
//! provides the conversion steps:
//!
//! 1. [`remix_channels`]: map any interleaved layout onto the device layout.
//! 2. [`StreamResampler`]: stateful band-limited resampling with `rubato`
//!    (`SincFixedIn` + `BlackmanHarris2` window).  The filter history is kept
//!    between calls, so packet boundaries of a live stream leave no seams.
//!    The playback speed is applied as a relative ratio change.
//! 3. [`resample_buffer`]: one-shot conversion of a whole decoded file.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use thiserror::Error;

/// Input frames handed to rubato per call.
const CHUNK_FRAMES: usize = 1024;
/// Sinc filter length.  The output lags the input by half of it, and the
/// resampler holds back `SINC_LEN + 1` input frames of look-ahead.
const SINC_LEN: usize = 128;
/// Widest speed change the resampler is built for.
const MAX_RELATIVE_RATIO: f64 = 3.0;

/// Slowest playback speed the stream resampler accepts.
pub const MIN_SPEED: f32 = 0.5;
/// Fastest playback speed the stream resampler accepts.
pub const MAX_SPEED: f32 = 2.0;

// ---------------------------------------------------------------------------
// remix_channels
// ---------------------------------------------------------------------------

/// Convert interleaved audio from `from` channels to `to` channels.
///
/// * Downmix to mono averages every channel of a frame.
/// * Otherwise output channel `c` copies input channel `c % from`, so mono is
///   duplicated to every speaker and stereo is repeated across surround
///   layouts.
/// * Either count being `0` yields an empty vector.
///
/// # Example
///
/// ```rust
/// use pomodoro_radio::audio::remix_channels;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, -0.2]; // L R L R
/// let mono = remix_channels(&stereo, 2, 1);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
///
/// let up = remix_channels(&[0.3_f32], 1, 2);
/// assert_eq!(up, vec![0.3, 0.3]);
/// ```
pub fn remix_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == 0 || to == 0 {
        return Vec::new();
    }
    if from == to {
        return samples.to_vec();
    }

    let from = from as usize;
    let to = to as usize;

    if to == 1 {
        return samples
            .chunks_exact(from)
            .map(|frame| frame.iter().sum::<f32>() / from as f32)
            .collect();
    }

    let mut out = Vec::with_capacity(samples.len() / from * to);
    for frame in samples.chunks_exact(from) {
        for c in 0..to {
            out.push(frame[c % from]);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// ResampleError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("cannot resample {channels} channels from {source_rate} Hz to {target_rate} Hz")]
    Unsupported {
        channels: u16,
        source_rate: u32,
        target_rate: u32,
    },

    #[error("resampler setup failed: {0}")]
    Setup(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

// ---------------------------------------------------------------------------
// StreamResampler
// ---------------------------------------------------------------------------

/// Resamples an open-ended interleaved stream from `source_rate` to
/// `target_rate`, optionally sped up or slowed down.
///
/// Input is buffered until a full chunk is available, so
/// [`process`](Self::process) may return nothing for short packets.
/// [`flush`](Self::flush) drains what is left at end of stream.
pub struct StreamResampler {
    inner: SincFixedIn<f32>,
    channels: usize,
    source_rate: u32,
    target_rate: u32,
    speed: f32,
    /// Set once a chunk has gone through; speed changes ramp from then on.
    started: bool,
    /// Deinterleaved input waiting for a full chunk.
    pending: Vec<Vec<f32>>,
}

impl StreamResampler {
    pub fn new(source_rate: u32, target_rate: u32, channels: u16) -> Result<Self, ResampleError> {
        if channels == 0 || source_rate == 0 || target_rate == 0 {
            return Err(ResampleError::Unsupported {
                channels,
                source_rate,
                target_rate,
            });
        }

        let params = SincInterpolationParameters {
            sinc_len: SINC_LEN,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };
        let inner = SincFixedIn::<f32>::new(
            f64::from(target_rate) / f64::from(source_rate),
            MAX_RELATIVE_RATIO,
            params,
            CHUNK_FRAMES,
            channels as usize,
        )?;

        Ok(Self {
            inner,
            channels: channels as usize,
            source_rate,
            target_rate,
            speed: 1.0,
            started: false,
            pending: vec![Vec::with_capacity(CHUNK_FRAMES); channels as usize],
        })
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels as u16
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Output frames produced per input frame at the current speed.
    pub fn ratio(&self) -> f64 {
        f64::from(self.target_rate) / f64::from(self.source_rate) / f64::from(self.speed)
    }

    /// Play the stream `speed` times faster (pitch follows).  Clamped to
    /// [`MIN_SPEED`]..=[`MAX_SPEED`]; non-finite values mean `1.0`.  Once
    /// audio is flowing the change is ramped over the next chunk.
    pub fn set_speed(&mut self, speed: f32) -> Result<(), ResampleError> {
        let speed = if speed.is_finite() {
            speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            1.0
        };
        if speed == self.speed {
            return Ok(());
        }
        self.inner
            .set_resample_ratio_relative(1.0 / f64::from(speed), self.started)?;
        self.speed = speed;
        Ok(())
    }

    /// Feed interleaved input and collect every output frame that is ready.
    /// A trailing partial frame is ignored.
    pub fn process(&mut self, interleaved: &[f32]) -> Result<Vec<f32>, ResampleError> {
        for frame in interleaved.chunks_exact(self.channels) {
            for (buffer, &sample) in self.pending.iter_mut().zip(frame) {
                buffer.push(sample);
            }
        }

        let mut out = Vec::new();
        while self.pending[0].len() >= CHUNK_FRAMES {
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|ch| ch.drain(..CHUNK_FRAMES).collect())
                .collect();
            let resampled = self.inner.process(&chunk, None)?;
            self.started = true;
            interleave_into(&resampled, &mut out);
        }
        Ok(out)
    }

    /// Drain the buffered input and the filter tail, then reset for a new
    /// stream at the same speed.  The tail may end in a few milliseconds
    /// of silence.
    pub fn flush(&mut self) -> Result<Vec<f32>, ResampleError> {
        let held = self.pending[0].len() + SINC_LEN + 1;
        let wanted = (held as f64 * self.ratio()).ceil() as usize;

        let mut out = Vec::with_capacity(wanted * self.channels);
        while out.len() / self.channels < wanted {
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|ch| {
                    let mut data = std::mem::take(ch);
                    data.resize(CHUNK_FRAMES, 0.0);
                    data
                })
                .collect();
            let resampled = self.inner.process(&chunk, None)?;
            interleave_into(&resampled, &mut out);
        }
        out.truncate(wanted * self.channels);

        self.inner.reset();
        self.started = false;
        if self.speed != 1.0 {
            self.inner
                .set_resample_ratio_relative(1.0 / f64::from(self.speed), false)?;
        }
        Ok(out)
    }
}

fn interleave_into(channels: &[Vec<f32>], out: &mut Vec<f32>) {
    let Some(frames) = channels.first().map(Vec::len) else {
        return;
    };
    out.reserve(frames * channels.len());
    for frame in 0..frames {
        for ch in channels {
            out.push(ch[frame]);
        }
    }
}

// ---------------------------------------------------------------------------
// resample_buffer
// ---------------------------------------------------------------------------

/// Resample a complete interleaved buffer from `source_rate` Hz to
/// `target_rate` Hz.
///
/// * Equal rates return a copy of the input.
/// * Empty input returns an empty vector.
///
/// The output is aligned with the input (the filter delay is removed) and
/// holds `round(frames * target_rate / source_rate)` frames.
///
/// # Example
///
/// ```rust
/// use pomodoro_radio::audio::resample_buffer;
///
/// // Downsample 4 800 mono frames from 48 kHz to 16 kHz (ratio = 1/3)
/// let hi = vec![0.5_f32; 4_800];
/// let lo = resample_buffer(&hi, 1, 48_000, 16_000).unwrap();
/// assert_eq!(lo.len(), 1_600);
/// ```
pub fn resample_buffer(
    samples: &[f32],
    channels: u16,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, ResampleError> {
    if source_rate == target_rate {
        return Ok(samples.to_vec());
    }
    let mut resampler = StreamResampler::new(source_rate, target_rate, channels)?;
    let ch = channels as usize;
    let frames = samples.len() / ch;
    if frames == 0 {
        return Ok(Vec::new());
    }

    let mut out = resampler.process(&samples[..frames * ch])?;
    // Push the last real frame past the look-ahead.
    out.extend(resampler.process(&vec![0.0; (2 * SINC_LEN + CHUNK_FRAMES) * ch])?);

    let ratio = resampler.ratio();
    let delay = ((SINC_LEN / 2) as f64 * ratio).round() as usize;
    let len = (frames as f64 * ratio).round() as usize;
    let available = out.len() / ch;
    let start = delay.min(available);
    let end = (start + len).min(available);
    Ok(out[start * ch..end * ch].to_vec())
}
