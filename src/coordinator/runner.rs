//! The coordinator loop: UI commands in, engine calls and state updates out.
//!
//! [`Coordinator`] owns the wiring between the timer, the audio engine and
//! the radio.  Everything that changes [`SharedState`] happens on this one
//! task, so commands and events are applied strictly in arrival order.
//!
//! ```text
//! UiCommand::TogglePlay ─▶ audio.resume ─▶ radio.play / pause ─▶ timer.start / stop
//! TimerEvent::PhaseChanged ─▶ cue (ding | ding + delayed ding | alarm)
//! RadioEvent ─▶ status line, timer start / stop
//! TrackInfo ─▶ track line, OS now-playing card
//! ```

use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::audio::{AudioEngine, Lane, LaneState, CUE_ALARM, CUE_DING};
use crate::config::AudioConfig;
use crate::media::{MediaUpdate, NowPlaying};
use crate::radio::{RadioEvent, RadioSource, TrackInfo};
use crate::timer::{Cue, TimerEngine, TimerEvent};

use super::state::{AppState, PlaybackStatus, SharedState, UiCommand};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Every channel the coordinator listens on.
pub struct CoordinatorInputs {
    pub commands: mpsc::Receiver<UiCommand>,
    pub timer: mpsc::UnboundedReceiver<TimerEvent>,
    pub radio: mpsc::UnboundedReceiver<RadioEvent>,
    pub tracks: mpsc::UnboundedReceiver<TrackInfo>,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct Coordinator {
    state: SharedState,
    timer: TimerEngine,
    audio: Arc<AudioEngine>,
    radio: Arc<dyn RadioSource>,
    config: AudioConfig,
    now_playing: Option<Arc<dyn NowPlaying>>,
    /// Last playback state handed to `now_playing`.
    published_playing: Option<bool>,
}

impl Coordinator {
    /// * `state`: shared with the UI.
    /// * `timer`: a handle to the timer whose events arrive in
    ///   [`CoordinatorInputs::timer`].
    /// * `radio`: the source whose events arrive in
    ///   [`CoordinatorInputs::radio`].
    pub fn new(
        state: SharedState,
        timer: TimerEngine,
        audio: Arc<AudioEngine>,
        radio: Arc<dyn RadioSource>,
        config: AudioConfig,
    ) -> Self {
        Self {
            state,
            timer,
            audio,
            radio,
            config,
            now_playing: None,
            published_playing: None,
        }
    }

    /// Mirror the track and play/pause state to `sink`.
    pub fn with_now_playing(mut self, sink: Arc<dyn NowPlaying>) -> Self {
        self.now_playing = Some(sink);
        self
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until the command channel closes.
    pub async fn run(mut self, inputs: CoordinatorInputs) {
        let CoordinatorInputs {
            mut commands,
            timer: mut timer_rx,
            radio: mut radio_rx,
            mut tracks,
        } = inputs;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = timer_rx.recv() => self.handle_timer(event),
                Some(event) = radio_rx.recv() => self.handle_radio(event),
                Some(track) = tracks.recv() => self.handle_track(track),
            }
            self.publish_playback();
        }

        self.timer.stop();
        log::info!("coordinator: command channel closed, shutting down");
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    async fn handle_command(&mut self, command: UiCommand) {
        log::debug!("coordinator: {command:?}");
        match command {
            UiCommand::TogglePlay => self.toggle_play().await,
            UiCommand::ToggleLane(lane) => self.toggle_lane(lane),
            UiCommand::SetVolume(lane, value) => self.set_volume(lane, value),
            UiCommand::SetSpeed(rate) => self.set_speed(rate),
            UiCommand::ResetTimer => {
                self.timer.reset();
                self.refresh_timer();
            }
        }
    }

    async fn toggle_play(&mut self) {
        if let Err(e) = self.audio.resume() {
            log::warn!("coordinator: {e}");
            self.lock().status = PlaybackStatus::Blocked;
            return;
        }

        let music_volume = self.lock().music_volume;
        self.audio.set_gain(Lane::Music, music_volume);

        if self.radio.is_paused() {
            let speed = self.lock().speed;
            self.radio.set_playback_rate(speed);

            match self.radio.play().await {
                Ok(()) => {
                    {
                        let mut st = self.lock();
                        st.status = PlaybackStatus::Playing;
                        st.is_playing = true;
                    }
                    self.timer.start();
                }
                Err(e) => {
                    log::warn!("coordinator: radio failed to start: {e}");
                    let mut st = self.lock();
                    st.status = PlaybackStatus::StreamError;
                    st.is_playing = false;
                }
            }
        } else {
            self.radio.pause();
            {
                let mut st = self.lock();
                st.status = PlaybackStatus::Paused;
                st.is_playing = false;
            }
            self.timer.stop();
        }

        self.refresh_timer();
    }

    fn toggle_lane(&mut self, lane: Lane) {
        // A native output has no autoplay gate; bring it up on first use.
        if let Err(e) = self.audio.resume() {
            log::debug!("coordinator: lane toggled while output blocked: {e}");
        }

        match self.audio.toggle(lane) {
            Ok(state) => self.lock().set_lane_on(lane, state == LaneState::On),
            Err(e) => log::warn!("coordinator: {e}"),
        }
    }

    fn set_volume(&mut self, lane: Lane, value: f32) {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        self.audio.set_gain(lane, value);
        self.lock().set_volume(lane, value);
    }

    fn set_speed(&mut self, rate: f32) {
        if !rate.is_finite() {
            return;
        }
        let rate = self.config.snap_speed(rate);
        self.radio.set_playback_rate(rate);
        self.lock().speed = rate;
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Tick(snapshot) => self.lock().timer = snapshot,
            TimerEvent::PhaseChanged(transition) => self.play_cue(transition.cue),
        }
    }

    fn play_cue(&self, cue: Cue) {
        match cue {
            Cue::Chime => self.audio.play_cue(CUE_DING),
            Cue::DoubleChime => {
                self.audio.play_cue(CUE_DING);
                self.audio.play_cue_after(
                    CUE_DING,
                    Duration::from_millis(self.config.double_chime_delay_ms),
                );
            }
            Cue::Alarm => self.audio.play_cue(CUE_ALARM),
        }
    }

    fn handle_radio(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::Buffering => {
                let mut st = self.lock();
                if st.is_playing {
                    st.status = PlaybackStatus::Buffering;
                }
            }
            RadioEvent::Playing => {
                // A late event from a session that was already paused.
                if self.radio.is_paused() {
                    return;
                }
                {
                    let mut st = self.lock();
                    st.status = PlaybackStatus::Playing;
                    st.is_playing = true;
                }
                self.timer.start();
            }
            RadioEvent::Paused => {
                {
                    let mut st = self.lock();
                    st.status = PlaybackStatus::Paused;
                    st.is_playing = false;
                }
                self.timer.stop();
            }
            RadioEvent::Error(reason) => {
                log::warn!("coordinator: stream error: {reason}");
                {
                    let mut st = self.lock();
                    st.status = PlaybackStatus::StreamError;
                    st.is_playing = false;
                }
                self.timer.stop();
            }
        }
        self.refresh_timer();
    }

    fn handle_track(&mut self, track: TrackInfo) {
        log::debug!("coordinator: now playing {:?} by {:?}", track.title, track.artist);
        if let Some(sink) = &self.now_playing {
            let title = if track.title.is_empty() {
                track.display.clone()
            } else {
                track.title.clone()
            };
            sink.publish(MediaUpdate::Track {
                artist: track.artist.clone(),
                title,
            });
        }
        self.lock().track = Some(track);
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn publish_playback(&mut self) {
        let Some(sink) = &self.now_playing else {
            return;
        };
        let playing = self.lock().is_playing;
        if self.published_playing != Some(playing) {
            self.published_playing = Some(playing);
            sink.publish(MediaUpdate::Playback(playing));
        }
    }

    fn refresh_timer(&self) {
        let snapshot = self.timer.snapshot();
        self.lock().timer = snapshot;
    }

    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::audio::{NullOutput, OutputBackend, OutputError, OutputFormat, OutputHandle, SampleData, SharedGraph, SAMPLE_RAIN};
    use crate::coordinator::state::new_shared_state;
    use crate::radio::RadioError;
    use crate::timer::{Phase, TimerSettings};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Radio that "connects" instantly, or fails when told to.
    struct MockRadio {
        paused: AtomicBool,
        fail: bool,
        plays: AtomicUsize,
        pauses: AtomicUsize,
        rate: AtomicU32,
        events: mpsc::UnboundedSender<RadioEvent>,
    }

    impl MockRadio {
        fn new(fail: bool, events: mpsc::UnboundedSender<RadioEvent>) -> Self {
            Self {
                paused: AtomicBool::new(true),
                fail,
                plays: AtomicUsize::new(0),
                pauses: AtomicUsize::new(0),
                rate: AtomicU32::new(1.0_f32.to_bits()),
                events,
            }
        }
    }

    #[async_trait]
    impl RadioSource for MockRadio {
        async fn play(&self) -> Result<(), RadioError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RadioError::Status(503));
            }
            self.paused.store(false, Ordering::SeqCst);
            let _ = self.events.send(RadioEvent::Playing);
            Ok(())
        }

        fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
            self.paused.store(true, Ordering::SeqCst);
            let _ = self.events.send(RadioEvent::Paused);
        }

        fn is_paused(&self) -> bool {
            self.paused.load(Ordering::SeqCst)
        }

        fn set_playback_rate(&self, rate: f32) {
            self.rate.store(rate.to_bits(), Ordering::SeqCst);
        }

        fn playback_rate(&self) -> f32 {
            f32::from_bits(self.rate.load(Ordering::SeqCst))
        }
    }

    /// Keeps every update the coordinator publishes.
    #[derive(Default)]
    struct RecordingSink {
        updates: std::sync::Mutex<Vec<MediaUpdate>>,
    }

    impl NowPlaying for RecordingSink {
        fn publish(&self, update: MediaUpdate) {
            self.updates.lock().unwrap().push(update);
        }
    }

    struct NoDevice;

    impl OutputBackend for NoDevice {
        fn open(&self, _graph: SharedGraph) -> Result<OutputHandle, OutputError> {
            Err(OutputError::NoDevice)
        }
    }

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    struct Harness {
        commands: mpsc::Sender<UiCommand>,
        radio_events: mpsc::UnboundedSender<RadioEvent>,
        tracks: mpsc::UnboundedSender<TrackInfo>,
        state: SharedState,
        timer: TimerEngine,
        audio: Arc<AudioEngine>,
        radio: Arc<MockRadio>,
        media: Arc<RecordingSink>,
        task: JoinHandle<()>,
    }

    struct Options {
        settings: TimerSettings,
        radio_fails: bool,
        backend: Box<dyn OutputBackend>,
    }

    impl Default for Options {
        fn default() -> Self {
            Self {
                settings: TimerSettings {
                    work_secs: 2,
                    short_break_secs: 1,
                    long_break_secs: 1,
                    total_work_periods: 2,
                },
                radio_fails: false,
                backend: Box::new(NullOutput::new(OutputFormat {
                    sample_rate: 8_000,
                    channels: 1,
                })),
            }
        }
    }

    /// Long enough that NullOutput (which never renders) keeps cues queued.
    fn chime() -> SampleData {
        SampleData::new(vec![0.5; 800], 1)
    }

    fn start(options: Options) -> Harness {
        let config = AudioConfig::default();
        let state = new_shared_state(options.settings, &config);
        let (timer, timer_rx) = TimerEngine::new(options.settings, Duration::from_secs(1));
        let audio = Arc::new(AudioEngine::new(config.clone(), options.backend));
        audio.insert_sample(CUE_DING, chime());
        audio.insert_sample(CUE_ALARM, chime());

        let (radio_events, radio_rx) = mpsc::unbounded_channel();
        let radio = Arc::new(MockRadio::new(options.radio_fails, radio_events.clone()));
        let (commands, commands_rx) = mpsc::channel(16);
        let (tracks, tracks_rx) = mpsc::unbounded_channel();

        let dyn_radio: Arc<dyn RadioSource> = radio.clone();
        let coordinator = Coordinator::new(
            Arc::clone(&state),
            timer.clone(),
            Arc::clone(&audio),
            dyn_radio,
            config,
        );
        let media = Arc::new(RecordingSink::default());
        let sink: Arc<dyn NowPlaying> = media.clone();
        let coordinator = coordinator.with_now_playing(sink);
        let task = tokio::spawn(coordinator.run(CoordinatorInputs {
            commands: commands_rx,
            timer: timer_rx,
            radio: radio_rx,
            tracks: tracks_rx,
        }));

        Harness {
            commands,
            radio_events,
            tracks,
            state,
            timer,
            audio,
            radio,
            media,
            task,
        }
    }

    /// Let the coordinator drain its queues.  With paused time the runtime
    /// only advances the clock once every task is idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    impl Harness {
        async fn send(&self, command: UiCommand) {
            self.commands.send(command).await.unwrap();
            settle().await;
        }

        fn status(&self) -> PlaybackStatus {
            self.state.lock().unwrap().status
        }
    }

    // -----------------------------------------------------------------------
    // Play / pause
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn play_starts_radio_and_timer() {
        let h = start(Options::default());
        h.send(UiCommand::TogglePlay).await;

        assert_eq!(h.status(), PlaybackStatus::Playing);
        assert!(h.state.lock().unwrap().is_playing);
        assert!(h.timer.is_running());
        assert_eq!(h.radio.plays.load(Ordering::SeqCst), 1);
        assert_eq!(h.audio.context_state(), crate::audio::ContextState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn second_toggle_pauses_radio_and_timer() {
        let h = start(Options::default());
        h.send(UiCommand::TogglePlay).await;
        h.send(UiCommand::TogglePlay).await;

        assert_eq!(h.status(), PlaybackStatus::Paused);
        assert!(!h.state.lock().unwrap().is_playing);
        assert!(!h.timer.is_running());
        assert_eq!(h.radio.pauses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_keeps_remaining_time() {
        let h = start(Options::default());
        h.send(UiCommand::TogglePlay).await;
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        h.send(UiCommand::TogglePlay).await;

        let st = h.state.lock().unwrap();
        assert_eq!(st.timer.phase, Phase::Work);
        assert_eq!(st.timer.remaining_secs, 1);
        assert!(!st.timer.running);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_play_reports_stream_error() {
        let h = start(Options {
            radio_fails: true,
            ..Options::default()
        });
        h.send(UiCommand::TogglePlay).await;

        assert_eq!(h.status(), PlaybackStatus::StreamError);
        assert!(!h.state.lock().unwrap().is_playing);
        assert_eq!(h.radio.plays.load(Ordering::SeqCst), 1);
        assert!(!h.timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_output_skips_the_radio() {
        let h = start(Options {
            backend: Box::new(NoDevice),
            ..Options::default()
        });
        h.send(UiCommand::TogglePlay).await;

        assert_eq!(h.status(), PlaybackStatus::Blocked);
        assert_eq!(h.radio.plays.load(Ordering::SeqCst), 0);
        assert!(!h.timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn play_applies_music_volume_and_speed() {
        let h = start(Options::default());
        h.send(UiCommand::SetVolume(Lane::Music, 0.2)).await;
        h.send(UiCommand::SetSpeed(0.9)).await;
        h.send(UiCommand::TogglePlay).await;

        assert!((h.audio.gain(Lane::Music) - 0.2).abs() < 1e-6);
        assert!((h.radio.playback_rate() - 0.9).abs() < 1e-6);
    }

    // -----------------------------------------------------------------------
    // Radio events
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn stream_error_stops_the_timer() {
        let h = start(Options::default());
        h.send(UiCommand::TogglePlay).await;

        h.radio_events.send(RadioEvent::Error("gone".into())).unwrap();
        settle().await;

        assert_eq!(h.status(), PlaybackStatus::StreamError);
        assert!(!h.timer.is_running());
        assert!(!h.state.lock().unwrap().is_playing);
    }

    #[tokio::test(start_paused = true)]
    async fn buffering_only_shows_while_playing() {
        let h = start(Options::default());
        h.radio_events.send(RadioEvent::Buffering).unwrap();
        settle().await;
        assert_eq!(h.status(), PlaybackStatus::Ready);

        h.send(UiCommand::TogglePlay).await;
        h.radio_events.send(RadioEvent::Buffering).unwrap();
        settle().await;
        assert_eq!(h.status(), PlaybackStatus::Buffering);
    }

    #[tokio::test(start_paused = true)]
    async fn late_playing_event_after_pause_is_ignored() {
        let h = start(Options::default());
        h.send(UiCommand::TogglePlay).await;
        h.send(UiCommand::TogglePlay).await;

        h.radio_events.send(RadioEvent::Playing).unwrap();
        settle().await;

        assert_eq!(h.status(), PlaybackStatus::Paused);
        assert!(!h.timer.is_running());
    }

    // -----------------------------------------------------------------------
    // Cues
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn work_to_short_break_plays_one_chime() {
        let h = start(Options::default());
        h.send(UiCommand::TogglePlay).await;

        // 2 s of work spans three ticks.
        tokio::time::sleep(Duration::from_millis(3_100)).await;

        assert_eq!(h.state.lock().unwrap().timer.phase, Phase::ShortBreak);
        assert_eq!(h.audio.active_cue_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn final_work_period_plays_double_chime() {
        let h = start(Options {
            settings: TimerSettings {
                work_secs: 1,
                short_break_secs: 1,
                long_break_secs: 1,
                total_work_periods: 1,
            },
            ..Options::default()
        });
        h.send(UiCommand::TogglePlay).await;
        tokio::time::sleep(Duration::from_millis(2_100)).await;

        assert_eq!(h.state.lock().unwrap().timer.phase, Phase::LongBreak);
        assert_eq!(h.audio.active_cue_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn break_end_plays_alarm() {
        let h = start(Options::default());
        h.send(UiCommand::TogglePlay).await;

        // Work (3 ticks) then short break (2 ticks).
        tokio::time::sleep(Duration::from_millis(5_100)).await;

        let st = h.state.lock().unwrap();
        assert_eq!(st.timer.phase, Phase::Work);
        assert_eq!(st.timer.period_index, 2);
        drop(st);
        // Chime into the break, alarm out of it.
        assert_eq!(h.audio.active_cue_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_plays_no_cue() {
        let h = start(Options::default());
        h.send(UiCommand::TogglePlay).await;
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        h.send(UiCommand::ResetTimer).await;

        let st = h.state.lock().unwrap();
        assert_eq!(st.timer.phase, Phase::Work);
        assert_eq!(st.timer.remaining_secs, 2);
        assert!(!st.timer.running);
        drop(st);
        assert!(!h.timer.is_running());
        assert_eq!(h.audio.active_cue_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Mixer
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn lane_toggle_is_recorded() {
        let h = start(Options::default());
        h.audio.insert_sample(SAMPLE_RAIN, chime());

        h.send(UiCommand::ToggleLane(Lane::Rain)).await;
        assert!(h.state.lock().unwrap().rain_on);
        assert!(h.audio.active_loop(Lane::Rain).is_some());

        h.send(UiCommand::ToggleLane(Lane::Rain)).await;
        assert!(!h.state.lock().unwrap().rain_on);
        assert!(h.audio.active_loop(Lane::Rain).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn lane_without_sample_stays_off() {
        let h = start(Options::default());
        h.send(UiCommand::ToggleLane(Lane::Vinyl)).await;
        assert!(!h.state.lock().unwrap().vinyl_on);
    }

    #[tokio::test(start_paused = true)]
    async fn volume_is_clamped_and_applied() {
        let h = start(Options::default());
        h.send(UiCommand::SetVolume(Lane::Rain, 1.7)).await;

        assert_eq!(h.state.lock().unwrap().rain_volume, 1.0);
        assert_eq!(h.audio.gain(Lane::Rain), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn speed_is_snapped() {
        let h = start(Options::default());
        h.send(UiCommand::SetSpeed(1.13)).await;

        assert!((h.state.lock().unwrap().speed - 1.15).abs() < 1e-6);
        assert!((h.radio.playback_rate() - 1.15).abs() < 1e-6);

        h.send(UiCommand::SetSpeed(f32::NAN)).await;
        assert!((h.state.lock().unwrap().speed - 1.15).abs() < 1e-6);
    }

    // -----------------------------------------------------------------------
    // Metadata / shutdown
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn track_reaches_the_track_line() {
        let h = start(Options::default());
        h.send(UiCommand::TogglePlay).await;
        h.tracks
            .send(TrackInfo {
                artist: "Tomppabeats".into(),
                title: "Monday Loop".into(),
                display: "Monday Loop".into(),
            })
            .unwrap();
        settle().await;

        assert_eq!(h.state.lock().unwrap().track_line(), "Now Playing: Monday Loop");
        assert!(h.media.updates.lock().unwrap().contains(&MediaUpdate::Track {
            artist: "Tomppabeats".into(),
            title: "Monday Loop".into(),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn playback_changes_reach_the_media_session() {
        let h = start(Options::default());
        h.send(UiCommand::TogglePlay).await;
        h.send(UiCommand::SetVolume(Lane::Music, 0.4)).await;
        h.send(UiCommand::TogglePlay).await;

        let updates = h.media.updates.lock().unwrap().clone();
        assert_eq!(
            updates,
            vec![MediaUpdate::Playback(true), MediaUpdate::Playback(false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn closing_commands_stops_the_loop() {
        let h = start(Options::default());
        h.send(UiCommand::TogglePlay).await;

        let Harness { commands, task, timer, .. } = h;
        drop(commands);
        task.await.unwrap();

        assert!(!timer.is_running());
    }
}
