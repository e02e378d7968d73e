//! Retry policy value object for external-service calls.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy applied per candidate inside the service adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the initial call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay between retries in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Hard cap on the computed delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Whether to add jitter to delays.
    #[serde(default = "default_true")]
    pub use_jitter: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2_000
}

fn default_max_delay_ms() -> u64 {
    15_000
}

fn default_true() -> bool {
    true
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Check if another retry is allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Delay before retry number `attempt` (0-indexed): `base * 2^attempt`,
    /// capped at `max_delay_ms`, with optional jitter of up to 25% on top.
    /// Jitter never pushes the delay past the cap.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let exp_delay_ms = self.base_delay_ms.saturating_mul(multiplier);
        let capped_ms = exp_delay_ms.min(self.max_delay_ms);

        if !self.use_jitter {
            return Duration::from_millis(capped_ms);
        }

        let jitter_ms = (capped_ms as f64 * 0.25 * rand::random::<f64>()) as u64;
        Duration::from_millis((capped_ms + jitter_ms).min(self.max_delay_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            use_jitter: default_true(),
        }
    }
}
