//! Bounded retry with fixed or exponential backoff

use std::time::Duration;

use crate::infrastructure::config::{BackoffStrategy, ScraperConfig};
use crate::infrastructure::scrape_error::ScrapeError;

/// How many times to attempt an operation and how long to pause in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            max_attempts: config.retry_count.max(1),
            base_delay: Duration::from_millis(config.retry_delay_ms),
            max_delay: Duration::from_millis(config.max_retry_delay_ms),
            backoff: config.retry_backoff,
        }
    }

    /// No pause between attempts
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff: BackoffStrategy::Fixed,
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.base_delay.saturating_mul(factor).min(self.max_delay.max(self.base_delay))
            }
        }
    }

    /// Pause before the next attempt, or `None` when the error is final:
    /// either it is not transient or `attempt` (1-based) was the last one.
    pub fn retry_delay(&self, attempt: u32, error: &ScrapeError) -> Option<Duration> {
        (error.is_retryable() && attempt < self.max_attempts.max(1)).then(|| self.delay_after(attempt))
    }
}
