//! Clock-driven timers for a run.
//!
//! The service owns one per-question slot and one run-wide countdown. It
//! never spawns anything itself: the driver ticks it, and `poll` reports
//! which deadline (if any) has passed.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use quiz_core::policy::TimerStrategy;
use quiz_core::time::seconds_two_decimals;

/// Remaining time under which the run countdown is flagged as low.
const LOW_TIME_SECS: i64 = 10;

/// A deadline that passed since the last poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerFired {
    /// The per-question countdown ran out.
    QuestionExpired,
    /// The run-wide countdown ran out.
    RunExpired,
}

/// What the timer display should show right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerReadout {
    Countdown { remaining_secs: i64 },
    Elapsed { seconds: f64 },
    RunRemaining { remaining_secs: i64, low: bool },
}

impl fmt::Display for TimerReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerReadout::Countdown { remaining_secs } => write!(f, "{remaining_secs}"),
            TimerReadout::Elapsed { seconds } if *seconds < 10.0 => write!(f, "{seconds:.2}"),
            TimerReadout::Elapsed { seconds } => write!(f, "{seconds:.0}"),
            TimerReadout::RunRemaining { remaining_secs, .. } => {
                write!(f, "{}:{:02}", remaining_secs / 60, remaining_secs % 60)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuestionTimer {
    Countdown { deadline: DateTime<Utc> },
    Elapsed { started_at: DateTime<Utc> },
}

/// Holds at most one per-question timer plus the optional run countdown.
#[derive(Debug, Clone, Default)]
pub struct TimerService {
    question: Option<QuestionTimer>,
    run_deadline: Option<DateTime<Utc>>,
}

impl TimerService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the timer for a freshly rendered question, replacing any previous one.
    pub fn start_question(&mut self, strategy: TimerStrategy, now: DateTime<Utc>) {
        self.question = match strategy {
            TimerStrategy::Countdown(secs) => Some(QuestionTimer::Countdown {
                deadline: now + Duration::seconds(i64::from(secs)),
            }),
            TimerStrategy::Elapsed => Some(QuestionTimer::Elapsed { started_at: now }),
            // The run countdown is already live; nothing per question.
            TimerStrategy::Global(_) | TimerStrategy::None => None,
        };
    }

    pub fn start_run_countdown(&mut self, deadline: DateTime<Utc>) {
        self.run_deadline = Some(deadline);
    }

    pub fn cancel_question(&mut self) {
        self.question = None;
    }

    pub fn cancel_all(&mut self) {
        self.question = None;
        self.run_deadline = None;
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.question.is_none() && self.run_deadline.is_none()
    }

    /// Report a passed deadline and disarm it.
    ///
    /// Run expiry wins and also clears the question slot, so nothing else
    /// fires after it.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<TimerFired> {
        if self.run_deadline.is_some_and(|deadline| now >= deadline) {
            self.cancel_all();
            return Some(TimerFired::RunExpired);
        }
        if let Some(QuestionTimer::Countdown { deadline }) = self.question {
            if now >= deadline {
                self.question = None;
                return Some(TimerFired::QuestionExpired);
            }
        }
        None
    }

    #[must_use]
    pub fn readout(&self, now: DateTime<Utc>) -> Option<TimerReadout> {
        match self.question {
            Some(QuestionTimer::Countdown { deadline }) => Some(TimerReadout::Countdown {
                remaining_secs: ceil_secs(deadline - now),
            }),
            Some(QuestionTimer::Elapsed { started_at }) => Some(TimerReadout::Elapsed {
                seconds: seconds_two_decimals(now - started_at),
            }),
            None => self.run_deadline.map(|deadline| {
                let remaining_secs = ceil_secs(deadline - now);
                TimerReadout::RunRemaining {
                    remaining_secs,
                    low: remaining_secs < LOW_TIME_SECS,
                }
            }),
        }
    }
}

fn ceil_secs(remaining: Duration) -> i64 {
    let millis = remaining.num_milliseconds().max(0);
    (millis + 999) / 1000
}
