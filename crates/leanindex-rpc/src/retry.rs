//! Fixed-delay retry policy.
//!
//! Head fetches are retried a bounded number of times with a constant pause
//! between attempts; the pause matches the slot cadence rather than growing.

use std::time::Duration;

/// Configuration for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Pause before each attempt after the first.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Stateless retry policy.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Delay to wait after `attempt` (1-based) has failed, or `None` when
    /// no attempts remain.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        self.should_retry(attempt).then_some(self.config.delay)
    }

    /// Returns `true` if another attempt is allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }

    /// Attempts the policy allows in total (at least one).
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }
}
