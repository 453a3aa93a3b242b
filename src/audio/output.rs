//! Audio output via `cpal`.
//!
//! [`OutputBackend`] is the seam between the [`AudioEngine`] and the sound
//! device.  [`CpalOutput`] renders the shared [`AudioGraph`] from the default
//! output device's callback; [`NullOutput`] accepts the graph and renders
//! nothing, which is what tests and headless runs use.
//!
//! `cpal::Stream` is not `Send` on every platform, so [`CpalOutput`] keeps it
//! on a dedicated thread.  The returned [`OutputHandle`] is a RAII guard:
//! dropping it stops that thread and with it the stream.
//!
//! [`AudioEngine`]: crate::audio::AudioEngine
//! [`AudioGraph`]: crate::audio::AudioGraph

use std::sync::{mpsc, PoisonError, TryLockError};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use thiserror::Error;

use crate::audio::graph::{OutputFormat, SharedGraph};

// ---------------------------------------------------------------------------
// OutputError
// ---------------------------------------------------------------------------

/// Errors that can occur while opening the output device.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported output sample format: {0:?}")]
    UnsupportedFormat(SampleFormat),

    #[error("audio output thread failed: {0}")]
    Thread(String),
}

// ---------------------------------------------------------------------------
// OutputHandle
// ---------------------------------------------------------------------------

/// Keeps an opened output alive.  Dropping it stops rendering.
pub struct OutputHandle {
    format: OutputFormat,
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl OutputHandle {
    /// A handle with nothing to tear down.
    pub fn detached(format: OutputFormat) -> Self {
        Self {
            format,
            shutdown: None,
            thread: None,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

impl Drop for OutputHandle {
    fn drop(&mut self) {
        // Dropping the sender wakes the output thread.
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("audio output thread panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// OutputBackend
// ---------------------------------------------------------------------------

/// Something that can render a [`SharedGraph`] to a device.
///
/// `open` must set the graph's format to the one it renders at before any
/// rendering starts.
pub trait OutputBackend: Send + Sync {
    fn open(&self, graph: SharedGraph) -> Result<OutputHandle, OutputError>;
}

// ---------------------------------------------------------------------------
// CpalOutput
// ---------------------------------------------------------------------------

/// The system default output device.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalOutput;

impl CpalOutput {
    pub fn new() -> Self {
        Self
    }
}

impl OutputBackend for CpalOutput {
    fn open(&self, graph: SharedGraph) -> Result<OutputHandle, OutputError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<OutputFormat, OutputError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || match start_stream(graph) {
                Ok((stream, format)) => {
                    let _ = ready_tx.send(Ok(format));
                    // Blocks until the handle is dropped.
                    let _ = stop_rx.recv();
                    drop(stream);
                    log::debug!("audio output stopped");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| OutputError::Thread(e.to_string()))?;

        let format = match ready_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(OutputError::Thread("output thread exited early".into())),
        };

        match format {
            Ok(format) => Ok(OutputHandle {
                format,
                shutdown: Some(stop_tx),
                thread: Some(thread),
            }),
            Err(e) => {
                let _ = thread.join();
                Err(e)
            }
        }
    }
}

fn start_stream(graph: SharedGraph) -> Result<(Stream, OutputFormat), OutputError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(OutputError::NoDevice)?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("using audio output device: {device_name}");

    let supported = device.default_output_config()?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    let format = OutputFormat {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };
    graph
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .set_format(format);

    log::debug!(
        "output config: {} Hz, {} channels, {sample_format:?}",
        format.sample_rate,
        format.channels
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, graph)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, graph)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, graph)?,
        other => return Err(OutputError::UnsupportedFormat(other)),
    };

    stream.play()?;
    Ok((stream, format))
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    graph: SharedGraph,
) -> Result<Stream, OutputError> {
    let channels = usize::from(config.channels);
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            match graph.try_lock() {
                Ok(mut g) => g.render(&mut scratch, channels),
                Err(TryLockError::Poisoned(p)) => p.into_inner().render(&mut scratch, channels),
                // Contended: one buffer of silence rather than blocking the device.
                Err(TryLockError::WouldBlock) => scratch.fill(0.0),
            }
            for (out, s) in data.iter_mut().zip(&scratch) {
                *out = T::from_sample(*s);
            }
        },
        |err: cpal::StreamError| {
            log::error!("cpal stream error: {err}");
        },
        None,
    )?;

    Ok(stream)
}

// ---------------------------------------------------------------------------
// NullOutput
// ---------------------------------------------------------------------------

/// Accepts the graph at a fixed format and never renders it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput {
    format: OutputFormat,
}

impl NullOutput {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl OutputBackend for NullOutput {
    fn open(&self, graph: SharedGraph) -> Result<OutputHandle, OutputError> {
        graph
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_format(self.format);
        Ok(OutputHandle::detached(self.format))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
