//! Pomodoro phase machine.
//!
//! [`TimerState`] is plain data; [`TimerState::tick`] is the whole state
//! machine and performs no I/O, so it can be driven directly in tests.
//!
//! ```text
//! Work(p < total) ──0s──▶ ShortBreak ──0s──▶ Work(p + 1)
//! Work(p = total) ──0s──▶ LongBreak  ──0s──▶ Work(1)
//! ```

use crate::config::TimerConfig;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The current Pomodoro phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Work,
    ShortBreak,
    LongBreak,
}

impl Phase {
    /// A short human-readable label for the session readout.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Work => "Work",
            Phase::ShortBreak => "Break",
            Phase::LongBreak => "Long Break",
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, Phase::Work)
    }
}

// ---------------------------------------------------------------------------
// Cue
// ---------------------------------------------------------------------------

/// The sound that announces a phase transition.
///
/// The timer only names the cue; mapping it onto samples is the
/// coordinator's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// One ding: a work period ended, short break begins.
    Chime,
    /// Two dings a fixed delay apart: the last work period ended.
    DoubleChime,
    /// Alarm beep: a break ended, back to work.
    Alarm,
}

// ---------------------------------------------------------------------------
// PhaseTransition
// ---------------------------------------------------------------------------

/// Emitted by [`TimerState::tick`] when a phase boundary is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    /// Period index after the transition.
    pub period_index: u32,
    pub cue: Cue,
}

// ---------------------------------------------------------------------------
// TimerSettings
// ---------------------------------------------------------------------------

/// Phase durations in seconds plus the cycle length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    pub work_secs: u32,
    pub short_break_secs: u32,
    pub long_break_secs: u32,
    /// Always at least 1.
    pub total_work_periods: u32,
}

impl TimerSettings {
    pub fn duration_for(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Work => self.work_secs,
            Phase::ShortBreak => self.short_break_secs,
            Phase::LongBreak => self.long_break_secs,
        }
    }
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self::from(&TimerConfig::default())
    }
}

impl From<&TimerConfig> for TimerSettings {
    fn from(cfg: &TimerConfig) -> Self {
        Self {
            work_secs: cfg.work_minutes.saturating_mul(60),
            short_break_secs: cfg.short_break_minutes.saturating_mul(60),
            long_break_secs: cfg.long_break_minutes.saturating_mul(60),
            total_work_periods: cfg.total_work_periods.max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// TimerState
// ---------------------------------------------------------------------------

/// Snapshot of the Pomodoro countdown.
///
/// `running` is maintained by [`crate::timer::TimerEngine`]; the phase
/// machine itself ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    pub phase: Phase,
    /// Which work period is active, or was just completed during a break.
    pub period_index: u32,
    pub remaining_secs: u32,
    pub running: bool,
}

impl TimerState {
    /// Work, period 1, full work duration, not running.
    pub fn new(settings: &TimerSettings) -> Self {
        Self {
            phase: Phase::Work,
            period_index: 1,
            remaining_secs: settings.work_secs,
            running: false,
        }
    }

    /// Advance the countdown by one tick.
    ///
    /// A non-zero countdown is decremented. A countdown that was already at
    /// zero moves to the next phase and reloads its full duration, so a
    /// phase of `n` seconds spans `n + 1` ticks.
    pub fn tick(&mut self, settings: &TimerSettings) -> Option<PhaseTransition> {
        if self.remaining_secs > 0 {
            self.remaining_secs -= 1;
            return None;
        }

        let from = self.phase;
        let (to, cue) = match self.phase {
            Phase::Work if self.period_index >= settings.total_work_periods => {
                (Phase::LongBreak, Cue::DoubleChime)
            }
            Phase::Work => (Phase::ShortBreak, Cue::Chime),
            Phase::ShortBreak => {
                self.period_index += 1;
                (Phase::Work, Cue::Alarm)
            }
            Phase::LongBreak => {
                self.period_index = 1;
                (Phase::Work, Cue::Alarm)
            }
        };

        self.phase = to;
        self.remaining_secs = settings.duration_for(to);

        Some(PhaseTransition {
            from,
            to,
            period_index: self.period_index,
            cue,
        })
    }

    /// `"n/total"` readout for the session counter.
    pub fn period_label(&self, settings: &TimerSettings) -> String {
        format!("{}/{}", self.period_index, settings.total_work_periods)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
