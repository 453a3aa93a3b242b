//! [`AudioEngine`]: lazy output context, sample cache and lane control.
//!
//! The engine owns nothing audible until [`AudioEngine::ensure_initialized`]
//! runs; from then on there is exactly one [`AudioGraph`] for the life of
//! the process.  All methods take `&self` so the engine can be shared as
//! `Arc<AudioEngine>` between the coordinator, the radio and the loader.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::audio::decode::{decode_bytes, DecodeError, DecodedAudio};
use crate::audio::graph::{
    AudioGraph, FeedId, GraphError, Lane, LaneState, OutputFormat, SampleData, SharedGraph,
    SourceId,
};
use crate::audio::output::{OutputBackend, OutputHandle};
use crate::audio::resample::ResampleError;
use crate::config::AudioConfig;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AudioError {
    /// No output could be opened; playback has to be retried by the user.
    #[error("audio output is blocked: {0}")]
    ResumeBlocked(String),

    #[error("{0:?} lane does not take loop sources")]
    NotLoopable(Lane),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Resample(#[from] ResampleError),

    #[error("sample loader task failed: {0}")]
    Task(String),
}

// ---------------------------------------------------------------------------
// ContextState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No graph has been created yet.
    Uninitialized,
    /// The graph exists but renders silence.
    Suspended,
    Running,
}

struct AudioContext {
    graph: SharedGraph,
    output: Option<OutputHandle>,
}

/// A cached sample: the decoded original plus its conversion to `rate`.
struct CachedSample {
    decoded: Arc<DecodedAudio>,
    converted: Arc<SampleData>,
    rate: u32,
}

impl CachedSample {
    fn convert(decoded: DecodedAudio, rate: u32) -> Result<Self, ResampleError> {
        let converted = SampleData::from_decoded(&decoded, rate)?;
        Ok(Self {
            decoded: Arc::new(decoded),
            converted: Arc::new(converted),
            rate,
        })
    }
}

// ---------------------------------------------------------------------------
// AudioEngine
// ---------------------------------------------------------------------------

pub struct AudioEngine {
    config: AudioConfig,
    backend: Box<dyn OutputBackend>,
    context: Mutex<Option<AudioContext>>,
    samples: Mutex<HashMap<String, CachedSample>>,
}

impl AudioEngine {
    pub fn new(config: AudioConfig, backend: Box<dyn OutputBackend>) -> Self {
        Self {
            config,
            backend,
            context: Mutex::new(None),
            samples: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    // ── Context lifecycle ────────────────────────────────────────────────

    /// Create the graph and open the output, once.
    ///
    /// Later calls return the same graph.  A device that fails to open is
    /// logged and left for [`resume`](Self::resume) to retry.
    pub fn ensure_initialized(&self) -> SharedGraph {
        let mut context = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ctx) = context.as_ref() {
            return Arc::clone(&ctx.graph);
        }

        let mut graph = AudioGraph::new(OutputFormat::default());
        graph.set_gain(Lane::Music, self.config.music_volume);
        graph.set_gain(Lane::Rain, self.config.rain_volume);
        graph.set_gain(Lane::Vinyl, self.config.vinyl_volume);
        let graph = Arc::new(Mutex::new(graph));

        let output = match self.backend.open(Arc::clone(&graph)) {
            Ok(handle) => {
                let format = handle.format();
                log::info!(
                    "audio output open: {} Hz, {} channels",
                    format.sample_rate,
                    format.channels
                );
                Some(handle)
            }
            Err(e) => {
                log::warn!("audio output unavailable: {e}");
                None
            }
        };

        *context = Some(AudioContext {
            graph: Arc::clone(&graph),
            output,
        });
        graph
    }

    pub fn context_state(&self) -> ContextState {
        let context = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        match context.as_ref() {
            None => ContextState::Uninitialized,
            Some(ctx) => {
                let running = ctx
                    .graph
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_running();
                if running && ctx.output.is_some() {
                    ContextState::Running
                } else {
                    ContextState::Suspended
                }
            }
        }
    }

    /// Start rendering, opening the output first if it is not open yet.
    pub fn resume(&self) -> Result<(), AudioError> {
        let graph = self.ensure_initialized();

        let mut context = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(ctx) = context.as_mut() else {
            return Err(AudioError::ResumeBlocked("audio context missing".into()));
        };

        let opened = ctx.output.is_none();
        if opened {
            let handle = self
                .backend
                .open(Arc::clone(&graph))
                .map_err(|e| AudioError::ResumeBlocked(e.to_string()))?;
            ctx.output = Some(handle);
        }
        drop(context);

        // The device may have come up at a different rate than the graph
        // had while it was missing.
        if opened {
            self.refresh_loops(&graph);
        }

        graph
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_running(true);
        Ok(())
    }

    fn refresh_loops(&self, graph: &SharedGraph) {
        for lane in [Lane::Rain, Lane::Vinyl] {
            let Some(name) = lane.loop_sample() else {
                continue;
            };
            if self.active_loop(lane).is_none() {
                continue;
            }
            if let Some(data) = self.sample(name) {
                graph
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .replace_loop_data(lane, data);
            }
        }
    }

    /// Render silence until the next [`resume`](Self::resume).
    pub fn suspend(&self) {
        if let Some(graph) = self.graph() {
            graph
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .set_running(false);
        }
    }

    fn graph(&self) -> Option<SharedGraph> {
        self.context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|ctx| Arc::clone(&ctx.graph))
    }

    fn with_graph<R>(&self, f: impl FnOnce(&mut AudioGraph) -> R) -> R {
        let graph = self.ensure_initialized();
        let mut g = graph.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut g)
    }

    /// Format of the graph (the device's once the output is open).
    pub fn format(&self) -> OutputFormat {
        self.with_graph(|g| g.format())
    }

    // ── Sample cache ─────────────────────────────────────────────────────

    /// Read and decode every `(name, path)` pair concurrently.
    ///
    /// Failures are logged; the affected name simply stays absent from the
    /// cache, which turns its cue or loop into a no-op.
    pub async fn load_samples(&self, assets: Vec<(String, PathBuf)>) {
        let rate = self.format().sample_rate;

        let tasks: Vec<_> = assets
            .into_iter()
            .map(|(name, path)| {
                let handle = tokio::spawn(load_sample(path.clone(), rate));
                (name, path, handle)
            })
            .collect();

        for (name, path, handle) in tasks {
            match handle.await {
                Ok(Ok(cached)) => {
                    log::debug!(
                        "loaded sample '{name}' ({} frames at {} Hz)",
                        cached.converted.frames(),
                        cached.rate
                    );
                    self.cache().insert(name, cached);
                }
                Ok(Err(e)) => log::warn!("sample '{name}' from {} not loaded: {e}", path.display()),
                Err(e) => log::warn!("sample '{name}' loader panicked: {e}"),
            }
        }
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedSample>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cache samples that are already at the graph's current rate.
    pub fn insert_sample(&self, name: impl Into<String>, data: SampleData) {
        let rate = self.format().sample_rate;
        let decoded = DecodedAudio {
            samples: data.samples().to_vec(),
            sample_rate: rate,
            channels: data.channels(),
        };
        self.cache().insert(
            name.into(),
            CachedSample {
                decoded: Arc::new(decoded),
                converted: Arc::new(data),
                rate,
            },
        );
    }

    /// Cache decoded audio, converting it to the graph's current rate.
    pub fn insert_decoded(
        &self,
        name: impl Into<String>,
        decoded: DecodedAudio,
    ) -> Result<(), AudioError> {
        let cached = CachedSample::convert(decoded, self.format().sample_rate)?;
        self.cache().insert(name.into(), cached);
        Ok(())
    }

    pub fn has_sample(&self, name: &str) -> bool {
        self.cache().contains_key(name)
    }

    /// The named sample at the graph's current rate, reconverted from the
    /// decoded original if the rate changed since it was cached.
    fn sample(&self, name: &str) -> Option<Arc<SampleData>> {
        let rate = self.format().sample_rate;
        let (decoded, stale) = {
            let cache = self.cache();
            let entry = cache.get(name)?;
            if entry.rate == rate {
                return Some(Arc::clone(&entry.converted));
            }
            (Arc::clone(&entry.decoded), Arc::clone(&entry.converted))
        };

        match SampleData::from_decoded(&decoded, rate) {
            Ok(data) => {
                log::debug!("sample '{name}' reconverted to {rate} Hz");
                let data = Arc::new(data);
                if let Some(entry) = self.cache().get_mut(name) {
                    entry.converted = Arc::clone(&data);
                    entry.rate = rate;
                }
                Some(data)
            }
            Err(e) => {
                log::warn!("sample '{name}' not reconverted to {rate} Hz: {e}");
                Some(stale)
            }
        }
    }

    // ── Lanes ────────────────────────────────────────────────────────────

    /// Flip a loop lane: stop its source if one is active, otherwise start
    /// one from the cached sample.  Without a cached sample nothing starts
    /// and the lane reports [`LaneState::Off`].
    pub fn toggle(&self, lane: Lane) -> Result<LaneState, AudioError> {
        let Some(name) = lane.loop_sample() else {
            return Err(AudioError::NotLoopable(lane));
        };
        let sample = self.sample(name);

        self.with_graph(|g| {
            if g.stop_loop(lane).is_some() {
                return Ok(LaneState::Off);
            }
            let Some(data) = sample else {
                log::debug!("{} sample not loaded; lane stays off", lane.label());
                return Ok(LaneState::Off);
            };
            match g.start_loop(lane, data) {
                Ok(_) => Ok(LaneState::On),
                Err(GraphError::NotLoopable(lane)) => Err(AudioError::NotLoopable(lane)),
                // Unreachable after the stop above, but the lane is sounding.
                Err(GraphError::LaneBusy(_)) => Ok(LaneState::On),
            }
        })
    }

    pub fn active_loop(&self, lane: Lane) -> Option<SourceId> {
        self.graph().and_then(|graph| {
            graph
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .active_loop(lane)
        })
    }

    pub fn set_gain(&self, lane: Lane, value: f32) {
        self.with_graph(|g| g.set_gain(lane, value));
    }

    pub fn gain(&self, lane: Lane) -> f32 {
        self.with_graph(|g| g.gain(lane))
    }

    // ── Cues ─────────────────────────────────────────────────────────────

    /// Fire a one-shot cue on the output bus now.
    pub fn play_cue(&self, name: &str) {
        self.play_cue_after(name, Duration::ZERO);
    }

    /// Fire a one-shot cue once `delay` of output time has passed.
    pub fn play_cue_after(&self, name: &str, delay: Duration) {
        let Some(data) = self.sample(name) else {
            log::debug!("cue '{name}' not loaded; skipped");
            return;
        };
        self.with_graph(|g| {
            let delay_frames =
                (delay.as_secs_f64() * f64::from(g.format().sample_rate)).round() as usize;
            g.play_cue(data, delay_frames);
        });
    }

    pub fn active_cue_count(&self) -> usize {
        self.graph().map_or(0, |graph| {
            graph
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .active_cues()
        })
    }

    // ── Music lane ───────────────────────────────────────────────────────

    pub fn music_input(&self) -> MusicInput {
        MusicInput {
            graph: self.ensure_initialized(),
        }
    }
}

async fn load_sample(path: PathBuf, rate: u32) -> Result<CachedSample, AudioError> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| DecodeError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_owned);

    tokio::task::spawn_blocking(move || -> Result<CachedSample, AudioError> {
        let decoded = decode_bytes(bytes, extension.as_deref())?;
        Ok(CachedSample::convert(decoded, rate)?)
    })
    .await
    .map_err(|e| AudioError::Task(e.to_string()))?
}

// ---------------------------------------------------------------------------
// MusicInput
// ---------------------------------------------------------------------------

/// Write side of the music lane, handed to the radio.
#[derive(Clone)]
pub struct MusicInput {
    graph: SharedGraph,
}

impl MusicInput {
    fn lock(&self) -> std::sync::MutexGuard<'_, AudioGraph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new feed; anything from earlier feeds is discarded.
    pub fn open_feed(&self) -> FeedId {
        self.lock().open_feed()
    }

    pub fn close_feed(&self, feed: FeedId) {
        self.lock().close_feed(feed);
    }

    /// Returns `false` once `feed` has been superseded or closed.
    pub fn push(&self, feed: FeedId, samples: &[f32]) -> bool {
        self.lock().push_feed(feed, samples)
    }

    pub fn backlog_secs(&self) -> f32 {
        self.lock().feed_backlog_secs()
    }

    pub fn format(&self) -> OutputFormat {
        self.lock().format()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
