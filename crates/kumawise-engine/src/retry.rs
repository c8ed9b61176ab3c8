//! Exponential backoff for failed alert tasks

use crate::config::RetryConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(60),
            max_retries: 5,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_secs(config.base_delay_seconds),
            max_retries: config.max_retries,
        }
    }
}

impl RetryPolicy {
    /// base * 2^attempt, saturating instead of overflowing
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Delay before the next try after `attempt` failed, or `None` once the
    /// ceiling is reached. Attempts are counted from 0, so a unit gets
    /// `max_retries + 1` tries in total.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_retries).then(|| self.delay_for(attempt))
    }
}
