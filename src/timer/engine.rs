//! Countdown scheduling for the Pomodoro timer.
//!
//! [`TimerEngine`] owns the single [`TimerState`] and at most one tokio
//! interval task driving it.  Every schedule is tagged with a generation
//! number; `stop()` bumps the generation under the state lock, so a tick
//! that was already in flight when the schedule was cancelled observes the
//! mismatch and exits without touching the state.
//!
//! The state update and the event emission for a tick happen under one lock
//! acquisition.  A phase transition therefore re-arms nothing: the same
//! schedule simply keeps counting in the new phase.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::TimerConfig;
use crate::timer::state::{PhaseTransition, TimerSettings, TimerState};

// ---------------------------------------------------------------------------
// TimerEvent
// ---------------------------------------------------------------------------

/// Events delivered to whoever holds the receiver returned by
/// [`TimerEngine::new`].
#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    /// A tick was applied; carries the state after the tick.
    Tick(TimerState),
    /// A phase boundary was crossed during the tick.
    PhaseChanged(PhaseTransition),
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

struct Schedule {
    state: TimerState,
    /// Incremented on every start and stop.
    generation: u64,
    task: Option<JoinHandle<()>>,
}

// ---------------------------------------------------------------------------
// TimerEngine
// ---------------------------------------------------------------------------

/// Cloneable handle to the Pomodoro countdown.
///
/// `start` must be called from within a tokio runtime.
#[derive(Clone)]
pub struct TimerEngine {
    inner: Arc<Mutex<Schedule>>,
    settings: TimerSettings,
    period: Duration,
    events: mpsc::UnboundedSender<TimerEvent>,
}

impl TimerEngine {
    /// Create an idle engine at Work / period 1 / full duration.
    pub fn new(
        settings: TimerSettings,
        period: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let engine = Self {
            inner: Arc::new(Mutex::new(Schedule {
                state: TimerState::new(&settings),
                generation: 0,
                task: None,
            })),
            settings,
            period: period.max(Duration::from_millis(1)),
            events,
        };
        (engine, events_rx)
    }

    pub fn from_config(config: &TimerConfig) -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        Self::new(
            TimerSettings::from(config),
            Duration::from_millis(config.tick_interval_ms),
        )
    }

    /// Begin ticking once per period.  No-op while already running.
    pub fn start(&self) {
        let mut sched = self.lock();
        if sched.task.is_some() {
            return;
        }

        sched.generation += 1;
        sched.state.running = true;
        let task = tokio::spawn(run_schedule(
            Arc::clone(&self.inner),
            sched.generation,
            self.settings,
            self.period,
            self.events.clone(),
        ));
        sched.task = Some(task);
        log::debug!("timer: schedule {} started", sched.generation);
    }

    /// Cancel the schedule, keeping phase and remaining time (pause).
    /// No-op while stopped.
    pub fn stop(&self) {
        let mut sched = self.lock();
        if let Some(task) = sched.task.take() {
            sched.generation += 1;
            task.abort();
            log::debug!("timer: schedule stopped");
        }
        sched.state.running = false;
    }

    /// Stop and return to Work / period 1 / full duration.  Plays no cue.
    pub fn reset(&self) {
        self.stop();
        self.lock().state = TimerState::new(&self.settings);
    }

    pub fn snapshot(&self) -> TimerState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.lock().task.is_some()
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, Schedule> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_schedule(
    inner: Arc<Mutex<Schedule>>,
    generation: u64,
    settings: TimerSettings,
    period: Duration,
    events: mpsc::UnboundedSender<TimerEvent>,
) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let mut sched = inner.lock().unwrap_or_else(PoisonError::into_inner);
        if sched.generation != generation {
            return;
        }

        if let Some(transition) = sched.state.tick(&settings) {
            log::info!(
                "timer: {} → {} (period {})",
                transition.from.label(),
                transition.to.label(),
                transition.period_index
            );
            let _ = events.send(TimerEvent::PhaseChanged(transition));
        }
        let _ = events.send(TimerEvent::Tick(sched.state));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
