//! The mixing graph rendered by the output callback.
//!
//! ```text
//! radio feed ──▶ [Music gain] ──┐
//! rain loop  ──▶ [Rain gain]  ──┼──▶ output bus ──▶ clamp ──▶ device
//! vinyl loop ──▶ [Vinyl gain] ──┤
//! cue voices ───────────────────┘
//! ```
//!
//! Gains live on the lanes, not on the sources, so a gain set before a loop
//! exists applies to it from its first frame.  Cues are summed straight
//! into the output bus and are unaffected by lane volumes.
//!
//! The graph is shared with the output callback as [`SharedGraph`]; every
//! mutation is a short critical section.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::audio::buffer::RingBuffer;
use crate::audio::decode::DecodedAudio;
use crate::audio::resample::{resample_buffer, ResampleError};

/// Seconds of radio PCM the music feed can hold before overwriting.
const FEED_CAPACITY_SECS: u32 = 10;

// ---------------------------------------------------------------------------
// Lane
// ---------------------------------------------------------------------------

/// An independently volume-controlled path into the output bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Music,
    Rain,
    Vinyl,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::Music, Lane::Rain, Lane::Vinyl];

    fn index(self) -> usize {
        match self {
            Lane::Music => 0,
            Lane::Rain => 1,
            Lane::Vinyl => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Lane::Music => "Music",
            Lane::Rain => "Rain",
            Lane::Vinyl => "Vinyl",
        }
    }

    /// Name of the cached sample looped on this lane, if it takes loops.
    pub fn loop_sample(&self) -> Option<&'static str> {
        match self {
            Lane::Music => None,
            Lane::Rain => Some(crate::audio::SAMPLE_RAIN),
            Lane::Vinyl => Some(crate::audio::SAMPLE_VINYL),
        }
    }
}

/// Whether a loop lane is sounding after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    On,
    Off,
}

// ---------------------------------------------------------------------------
// OutputFormat / SampleData
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

/// A decoded sample converted to the graph's rate.
///
/// The channel layout is kept as decoded; rendering maps output channel `c`
/// onto sample channel `c % channels`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleData {
    samples: Vec<f32>,
    channels: u16,
}

impl SampleData {
    /// Wrap interleaved samples already at the graph rate.
    ///
    /// A zero channel count is treated as mono.
    pub fn new(samples: Vec<f32>, channels: u16) -> Self {
        Self {
            samples,
            channels: channels.max(1),
        }
    }

    /// Convert decoded audio to `sample_rate`, keeping its channel layout.
    pub fn from_decoded(audio: &DecodedAudio, sample_rate: u32) -> Result<Self, ResampleError> {
        let samples = resample_buffer(
            &audio.samples,
            audio.channels,
            audio.sample_rate,
            sample_rate,
        )?;
        Ok(Self::new(samples, audio.channels))
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn sample(&self, frame: usize, out_channel: usize) -> f32 {
        let ch = self.channels as usize;
        self.samples[frame * ch + out_channel % ch]
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Identifies one loop source for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

/// Identifies one radio connection's worth of samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedId(u64);

struct LoopSource {
    id: SourceId,
    data: Arc<SampleData>,
    frame: usize,
}

struct CueVoice {
    data: Arc<SampleData>,
    frame: usize,
    delay_frames: usize,
}

impl CueVoice {
    fn finished(&self) -> bool {
        self.delay_frames == 0 && self.frame >= self.data.frames()
    }
}

// ---------------------------------------------------------------------------
// GraphError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("{0:?} lane already has an active loop")]
    LaneBusy(Lane),

    #[error("{0:?} lane does not take loop sources")]
    NotLoopable(Lane),
}

// ---------------------------------------------------------------------------
// AudioGraph
// ---------------------------------------------------------------------------

pub type SharedGraph = Arc<Mutex<AudioGraph>>;

pub struct AudioGraph {
    format: OutputFormat,
    /// `false` while the context is suspended; renders silence.
    running: bool,
    gains: [f32; 3],
    loops: [Option<LoopSource>; 3],
    cues: Vec<CueVoice>,
    feed: RingBuffer<f32>,
    feed_id: Option<FeedId>,
    next_id: u64,
    scratch: Vec<f32>,
}

impl AudioGraph {
    /// A suspended graph with every lane at unity gain.
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            running: false,
            gains: [1.0; 3],
            loops: [None, None, None],
            cues: Vec::new(),
            feed: RingBuffer::new(feed_capacity(format)),
            feed_id: None,
            next_id: 0,
            scratch: Vec::new(),
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Adopt the device's format.  Drops any buffered radio PCM.
    pub fn set_format(&mut self, format: OutputFormat) {
        if format != self.format {
            self.format = format;
            self.feed = RingBuffer::new(feed_capacity(format));
        }
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // ── Gains ────────────────────────────────────────────────────────────

    /// Set a lane's gain, clamped to `[0, 1]`.  Takes effect on the next
    /// rendered buffer whether or not a source is attached.
    pub fn set_gain(&mut self, lane: Lane, gain: f32) {
        let gain = if gain.is_nan() { 0.0 } else { gain.clamp(0.0, 1.0) };
        self.gains[lane.index()] = gain;
    }

    pub fn gain(&self, lane: Lane) -> f32 {
        self.gains[lane.index()]
    }

    // ── Loop sources ─────────────────────────────────────────────────────

    /// Attach a looping source to `lane`.  A lane holds at most one.
    pub fn start_loop(&mut self, lane: Lane, data: Arc<SampleData>) -> Result<SourceId, GraphError> {
        if lane.loop_sample().is_none() {
            return Err(GraphError::NotLoopable(lane));
        }
        let slot = &mut self.loops[lane.index()];
        if slot.is_some() {
            return Err(GraphError::LaneBusy(lane));
        }

        self.next_id += 1;
        let id = SourceId(self.next_id);
        *slot = Some(LoopSource { id, data, frame: 0 });
        Ok(id)
    }

    /// Detach and drop the lane's loop source, returning its id.
    pub fn stop_loop(&mut self, lane: Lane) -> Option<SourceId> {
        self.loops[lane.index()].take().map(|src| src.id)
    }

    pub fn active_loop(&self, lane: Lane) -> Option<SourceId> {
        self.loops[lane.index()].as_ref().map(|src| src.id)
    }

    /// Swap the data under an active loop, keeping its id and its position
    /// scaled to the new length.  Returns `false` if the lane is idle.
    pub fn replace_loop_data(&mut self, lane: Lane, data: Arc<SampleData>) -> bool {
        let Some(src) = self.loops[lane.index()].as_mut() else {
            return false;
        };
        let old = src.data.frames();
        src.frame = if old == 0 || data.frames() == 0 {
            0
        } else {
            (src.frame as u64 * data.frames() as u64 / old as u64) as usize % data.frames()
        };
        src.data = data;
        true
    }

    // ── Cues ─────────────────────────────────────────────────────────────

    /// Queue a one-shot voice on the output bus, starting after
    /// `delay_frames` frames of the output clock.
    pub fn play_cue(&mut self, data: Arc<SampleData>, delay_frames: usize) {
        self.cues.push(CueVoice {
            data,
            frame: 0,
            delay_frames,
        });
    }

    /// Voices queued or still sounding.
    pub fn active_cues(&self) -> usize {
        self.cues.len()
    }

    // ── Radio feed ───────────────────────────────────────────────────────

    /// Start a new feed, discarding anything buffered by a previous one.
    pub fn open_feed(&mut self) -> FeedId {
        self.next_id += 1;
        let id = FeedId(self.next_id);
        self.feed.clear();
        self.feed_id = Some(id);
        id
    }

    /// Close `id` if it is still the current feed.
    pub fn close_feed(&mut self, id: FeedId) {
        if self.feed_id == Some(id) {
            self.feed_id = None;
            self.feed.clear();
        }
    }

    /// Append interleaved PCM in the graph's format.  Returns `false` and
    /// drops the samples when `id` is no longer the current feed.
    pub fn push_feed(&mut self, id: FeedId, samples: &[f32]) -> bool {
        if self.feed_id != Some(id) {
            return false;
        }
        self.feed.push_slice(samples);
        true
    }

    /// Seconds of radio audio waiting to be rendered.
    pub fn feed_backlog_secs(&self) -> f32 {
        self.feed
            .duration_secs(self.format.sample_rate, self.format.channels)
    }

    // ── Rendering ────────────────────────────────────────────────────────

    /// Mix one interleaved output buffer.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        out.fill(0.0);
        if !self.running || channels == 0 {
            return;
        }
        let frames = out.len() / channels;

        if self.feed_id.is_some() {
            let gain = self.gains[Lane::Music.index()];
            self.scratch.resize(out.len(), 0.0);
            let n = self.feed.pop_into(&mut self.scratch[..out.len()]);
            for (o, s) in out.iter_mut().zip(&self.scratch[..n]) {
                *o += s * gain;
            }
        }

        for lane in [Lane::Rain, Lane::Vinyl] {
            let gain = self.gains[lane.index()];
            let Some(src) = self.loops[lane.index()].as_mut() else {
                continue;
            };
            let total = src.data.frames();
            if total == 0 {
                continue;
            }
            for f in 0..frames {
                for c in 0..channels {
                    out[f * channels + c] += src.data.sample(src.frame, c) * gain;
                }
                src.frame = (src.frame + 1) % total;
            }
        }

        for voice in &mut self.cues {
            let total = voice.data.frames();
            for f in 0..frames {
                if voice.delay_frames > 0 {
                    voice.delay_frames -= 1;
                    continue;
                }
                if voice.frame >= total {
                    break;
                }
                for c in 0..channels {
                    out[f * channels + c] += voice.data.sample(voice.frame, c);
                }
                voice.frame += 1;
            }
        }
        self.cues.retain(|v| !v.finished());

        for s in out.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
    }
}

fn feed_capacity(format: OutputFormat) -> usize {
    (format.sample_rate as usize * format.channels.max(1) as usize * FEED_CAPACITY_SECS as usize)
        .max(1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn mono() -> OutputFormat {
        OutputFormat {
            sample_rate: 8_000,
            channels: 1,
        }
    }

    fn running_graph(format: OutputFormat) -> AudioGraph {
        let mut g = AudioGraph::new(format);
        g.set_running(true);
        g
    }

    fn constant(value: f32, frames: usize) -> Arc<SampleData> {
        Arc::new(SampleData::new(vec![value; frames], 1))
    }

    fn render(g: &mut AudioGraph, frames: usize, channels: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * channels];
        g.render(&mut out, channels);
        out
    }

    fn approx(a: &[f32], b: &[f32]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6)
    }

    // ---- Gains ---------------------------------------------------------------

    #[test]
    fn gain_set_before_source_applies_on_start() {
        let mut g = running_graph(mono());
        g.set_gain(Lane::Rain, 0.25);
        g.start_loop(Lane::Rain, constant(1.0, 16)).unwrap();

        assert!(approx(&render(&mut g, 4, 1), &[0.25; 4]));
    }

    #[test]
    fn gain_change_applies_while_sounding() {
        let mut g = running_graph(mono());
        g.start_loop(Lane::Vinyl, constant(0.5, 16)).unwrap();
        assert!(approx(&render(&mut g, 2, 1), &[0.5; 2]));

        g.set_gain(Lane::Vinyl, 0.5);
        assert!(approx(&render(&mut g, 2, 1), &[0.25; 2]));
    }

    #[test]
    fn gain_is_clamped() {
        let mut g = AudioGraph::new(mono());
        g.set_gain(Lane::Music, 3.0);
        assert_eq!(g.gain(Lane::Music), 1.0);
        g.set_gain(Lane::Music, -1.0);
        assert_eq!(g.gain(Lane::Music), 0.0);
        g.set_gain(Lane::Music, f32::NAN);
        assert_eq!(g.gain(Lane::Music), 0.0);
    }

    // ---- Loop lifecycle --------------------------------------------------------

    #[test]
    fn second_loop_on_busy_lane_is_rejected() {
        let mut g = AudioGraph::new(mono());
        let first = g.start_loop(Lane::Rain, constant(0.1, 4)).unwrap();
        assert_eq!(
            g.start_loop(Lane::Rain, constant(0.1, 4)),
            Err(GraphError::LaneBusy(Lane::Rain))
        );
        assert_eq!(g.active_loop(Lane::Rain), Some(first));
    }

    #[test]
    fn on_off_on_leaves_exactly_one_fresh_source() {
        let mut g = running_graph(mono());
        let data = constant(0.5, 4);

        let first = g.start_loop(Lane::Rain, Arc::clone(&data)).unwrap();
        assert_eq!(g.stop_loop(Lane::Rain), Some(first));
        assert_eq!(g.active_loop(Lane::Rain), None);
        let second = g.start_loop(Lane::Rain, Arc::clone(&data)).unwrap();

        assert_ne!(first, second);
        assert_eq!(g.active_loop(Lane::Rain), Some(second));
        // Graph + local handle only: the stopped source was dropped.
        assert_eq!(Arc::strong_count(&data), 2);
        // One source, not two, is summed.
        assert!(approx(&render(&mut g, 2, 1), &[0.5; 2]));
    }

    #[test]
    fn music_lane_does_not_take_loops() {
        let mut g = AudioGraph::new(mono());
        assert_eq!(
            g.start_loop(Lane::Music, constant(0.1, 4)),
            Err(GraphError::NotLoopable(Lane::Music))
        );
    }

    #[test]
    fn loop_wraps_around() {
        let mut g = running_graph(mono());
        g.start_loop(Lane::Rain, Arc::new(SampleData::new(vec![0.1, 0.2, 0.3], 1)))
            .unwrap();
        assert!(approx(&render(&mut g, 5, 1), &[0.1, 0.2, 0.3, 0.1, 0.2]));
        assert!(approx(&render(&mut g, 2, 1), &[0.3, 0.1]));
    }

    #[test]
    fn mono_loop_is_duplicated_on_stereo_output() {
        let mut g = running_graph(OutputFormat::default());
        g.start_loop(Lane::Rain, Arc::new(SampleData::new(vec![0.1, 0.2], 1)))
            .unwrap();
        assert!(approx(&render(&mut g, 2, 2), &[0.1, 0.1, 0.2, 0.2]));
    }

    // ---- Cues ------------------------------------------------------------------

    #[test]
    fn cue_bypasses_lane_gains() {
        let mut g = running_graph(mono());
        for lane in Lane::ALL {
            g.set_gain(lane, 0.0);
        }
        g.play_cue(constant(0.8, 2), 0);

        assert!(approx(&render(&mut g, 3, 1), &[0.8, 0.8, 0.0]));
        assert_eq!(g.active_cues(), 0);
    }

    #[test]
    fn delayed_cue_starts_late_and_retires() {
        let mut g = running_graph(mono());
        g.play_cue(constant(1.0, 2), 2);

        assert!(approx(&render(&mut g, 3, 1), &[0.0, 0.0, 1.0]));
        assert_eq!(g.active_cues(), 1);
        assert!(approx(&render(&mut g, 3, 1), &[1.0, 0.0, 0.0]));
        assert_eq!(g.active_cues(), 0);
    }

    #[test]
    fn overlapping_cues_sum() {
        let mut g = running_graph(mono());
        g.play_cue(constant(0.3, 2), 0);
        g.play_cue(constant(0.3, 2), 1);

        assert!(approx(&render(&mut g, 3, 1), &[0.3, 0.6, 0.3]));
    }

    #[test]
    fn mix_is_clamped() {
        let mut g = running_graph(mono());
        g.start_loop(Lane::Rain, constant(0.9, 4)).unwrap();
        g.start_loop(Lane::Vinyl, constant(0.9, 4)).unwrap();
        assert!(approx(&render(&mut g, 2, 1), &[1.0, 1.0]));
    }

    // ---- Suspended ---------------------------------------------------------------

    #[test]
    fn suspended_graph_renders_silence_and_keeps_position() {
        let mut g = AudioGraph::new(mono());
        g.start_loop(Lane::Rain, Arc::new(SampleData::new(vec![0.1, 0.2], 1)))
            .unwrap();
        assert!(approx(&render(&mut g, 2, 1), &[0.0, 0.0]));

        g.set_running(true);
        assert!(approx(&render(&mut g, 1, 1), &[0.1]));
    }

    // ---- Radio feed ----------------------------------------------------------------

    #[test]
    fn feed_goes_through_music_gain() {
        let mut g = running_graph(mono());
        g.set_gain(Lane::Music, 0.5);
        let feed = g.open_feed();
        assert!(g.push_feed(feed, &[0.4, 0.4]));

        assert!(approx(&render(&mut g, 3, 1), &[0.2, 0.2, 0.0]));
    }

    #[test]
    fn stale_feed_samples_are_discarded() {
        let mut g = running_graph(mono());
        let old = g.open_feed();
        g.push_feed(old, &[0.5; 4]);
        g.close_feed(old);
        let new = g.open_feed();

        assert!(!g.push_feed(old, &[0.9; 4]));
        assert!(g.push_feed(new, &[0.1]));
        assert!(approx(&render(&mut g, 2, 1), &[0.1, 0.0]));
    }

    #[test]
    fn closing_an_old_feed_keeps_the_current_one() {
        let mut g = running_graph(mono());
        let old = g.open_feed();
        let new = g.open_feed();
        g.close_feed(old);
        assert!(g.push_feed(new, &[0.1]));
    }

    #[test]
    fn backlog_reports_seconds() {
        let mut g = AudioGraph::new(mono());
        let feed = g.open_feed();
        g.push_feed(feed, &vec![0.0; 4_000]);
        assert!((g.feed_backlog_secs() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn replacing_loop_data_keeps_id_and_relative_position() {
        let mut g = running_graph(mono());
        let id = g.start_loop(Lane::Rain, constant(0.1, 100)).unwrap();
        let mut out = vec![0.0; 50];
        g.render(&mut out, 1);

        assert!(g.replace_loop_data(Lane::Rain, constant(0.4, 200)));
        assert_eq!(g.active_loop(Lane::Rain), Some(id));
        g.render(&mut out, 1);
        assert!(out.iter().all(|s| (s - 0.4).abs() < 1e-6));

        assert!(!g.replace_loop_data(Lane::Vinyl, constant(0.4, 200)));
        assert_eq!(g.active_loop(Lane::Vinyl), None);
    }

    // ---- SampleData ----------------------------------------------------------------

    #[test]
    fn sample_data_is_resampled_to_graph_rate() {
        let decoded = DecodedAudio {
            samples: vec![0.5; 800],
            sample_rate: 8_000,
            channels: 1,
        };
        let data = SampleData::from_decoded(&decoded, 48_000).unwrap();
        assert_eq!(data.frames(), 4_800);
        assert_eq!(data.channels(), 1);
    }
}
