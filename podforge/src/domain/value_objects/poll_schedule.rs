//! Polling schedule value object.
//!
//! Polling loops take their per-attempt delay from an explicit schedule
//! instead of ad hoc sleep calls, so the cadence is testable in isolation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Interval schedule for polling an asynchronous external operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSchedule {
    /// Delay used for the first `ramp_after` attempts, in milliseconds.
    pub initial_delay_ms: u64,
    /// Delay used for every later attempt, in milliseconds.
    pub steady_delay_ms: u64,
    /// Number of attempts polled at the initial cadence.
    pub ramp_after: u32,
    /// Total attempt budget; exhausting it is a Timeout.
    pub max_attempts: u32,
}

impl PollSchedule {
    /// A fixed-interval schedule.
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        let ms = interval.as_millis() as u64;
        Self {
            initial_delay_ms: ms,
            steady_delay_ms: ms,
            ramp_after: 0,
            max_attempts,
        }
    }

    /// A schedule that polls frequently early and sparser later.
    pub fn adaptive(
        initial: Duration,
        steady: Duration,
        ramp_after: u32,
        max_attempts: u32,
    ) -> Self {
        Self {
            initial_delay_ms: initial.as_millis() as u64,
            steady_delay_ms: steady.as_millis() as u64,
            ramp_after,
            max_attempts,
        }
    }

    /// Delay before poll attempt number `attempt` (0-indexed), or `None`
    /// once the attempt budget is exhausted.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let ms = if attempt < self.ramp_after {
            self.initial_delay_ms
        } else {
            self.steady_delay_ms
        };
        Some(Duration::from_millis(ms))
    }

    /// Upper bound on the total time the schedule can spend waiting.
    pub fn total_budget(&self) -> Duration {
        let early = self.ramp_after.min(self.max_attempts) as u64 * self.initial_delay_ms;
        let late = self.max_attempts.saturating_sub(self.ramp_after) as u64 * self.steady_delay_ms;
        Duration::from_millis(early + late)
    }
}
