//! Mode policy table: which timer runs per question and whether a wrong
//! answer ends the run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::{Mode, SessionState};

/// Countdown ceiling for challenger questions before difficulty is subtracted.
pub const CHALLENGER_BASE_SECS: i32 = 20;
/// Shortest challenger countdown regardless of difficulty.
pub const CHALLENGER_FLOOR_SECS: i32 = 8;

//
// ─── TIMER STRATEGY ────────────────────────────────────────────────────────────
//

/// Timer that accompanies a question once it is rendered.
///
/// The coordinator holds at most one of these per question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStrategy {
    /// Nothing is measured or shown.
    None,
    /// Display-only stopwatch; never forces a submission.
    Elapsed,
    /// Per-question countdown in seconds; expiry submits an empty selection.
    Countdown(u32),
    /// No per-question timer; the run-wide countdown to this deadline is shown.
    Global(DateTime<Utc>),
}

/// Table entry describing how a timer is derived from session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRule {
    None,
    Elapsed,
    /// `max(floor, base - current_difficulty)` seconds.
    DifficultyScaled { base: i32, floor: i32 },
    Fixed(u32),
    /// Follow the run deadline fixed at start.
    RunDeadline,
}

/// One row of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModePolicy {
    pub timer: TimerRule,
    /// A single wrong answer terminates the run.
    pub ends_on_wrong: bool,
    /// The run length must be asked for before starting.
    pub asks_duration: bool,
}

impl ModePolicy {
    #[must_use]
    pub fn standard(mode: Mode) -> Self {
        match mode {
            Mode::Adaptive | Mode::LevelInfinity => Self {
                timer: TimerRule::Elapsed,
                ends_on_wrong: false,
                asks_duration: false,
            },
            Mode::Challenger => Self {
                timer: TimerRule::DifficultyScaled {
                    base: CHALLENGER_BASE_SECS,
                    floor: CHALLENGER_FLOOR_SECS,
                },
                ends_on_wrong: true,
                asks_duration: false,
            },
            Mode::FirstStrike => Self {
                timer: TimerRule::None,
                ends_on_wrong: true,
                asks_duration: false,
            },
            Mode::MinuteRush => Self {
                timer: TimerRule::RunDeadline,
                ends_on_wrong: false,
                asks_duration: true,
            },
        }
    }
}

//
// ─── POLICY TABLE ──────────────────────────────────────────────────────────────
//

/// Lookup from mode to policy, with optional per-mode overrides.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    overrides: HashMap<Mode, ModePolicy>,
}

impl PolicyTable {
    #[must_use]
    pub fn standard() -> Self {
        Self::default()
    }

    /// Replace the row for `mode`.
    #[must_use]
    pub fn with_rule(mut self, mode: Mode, policy: ModePolicy) -> Self {
        self.overrides.insert(mode, policy);
        self
    }

    #[must_use]
    pub fn policy(&self, mode: Mode) -> ModePolicy {
        self.overrides
            .get(&mode)
            .copied()
            .unwrap_or_else(|| ModePolicy::standard(mode))
    }

    /// Resolve the timer for the next question from the current state.
    #[must_use]
    pub fn timer_for(&self, mode: Mode, state: &SessionState) -> TimerStrategy {
        match self.policy(mode).timer {
            TimerRule::None => TimerStrategy::None,
            TimerRule::Elapsed => TimerStrategy::Elapsed,
            TimerRule::DifficultyScaled { base, floor } => {
                let secs = floor.max(base - state.current_difficulty()).max(1);
                TimerStrategy::Countdown(u32::try_from(secs).unwrap_or(1))
            }
            TimerRule::Fixed(secs) => TimerStrategy::Countdown(secs.max(1)),
            TimerRule::RunDeadline => state
                .run_deadline()
                .map_or(TimerStrategy::None, TimerStrategy::Global),
        }
    }

    #[must_use]
    pub fn ends_on_wrong(&self, mode: Mode) -> bool {
        self.policy(mode).ends_on_wrong
    }

    #[must_use]
    pub fn asks_duration(&self, mode: Mode) -> bool {
        self.policy(mode).asks_duration
    }
}

/// Timer for `mode` under the standard table.
#[must_use]
pub fn policy_for(mode: Mode, state: &SessionState) -> TimerStrategy {
    PolicyTable::standard().timer_for(mode, state)
}
