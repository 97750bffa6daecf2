// src/retry.rs

//! Per-task retry policy.
//!
//! Attempts are numbered from 1. The attempt that just failed is what gets
//! passed in, so a policy with `max_retries = 2` allows three attempts in
//! total.

use std::time::Duration;

use crate::types::BackoffStrategy;

/// Default delay between attempts when nothing else is configured.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub backoff: BackoffStrategy,
    /// Upper bound on the delay for exponential backoff.
    pub max_retry_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
            backoff: BackoffStrategy::Fixed,
            max_retry_delay: None,
        }
    }
}

impl RetryPolicy {
    /// Fixed-delay policy.
    pub fn fixed(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            ..Self::default()
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    pub fn with_exponential_backoff(mut self, max_retry_delay: Option<Duration>) -> Self {
        self.backoff = BackoffStrategy::Exponential;
        self.max_retry_delay = max_retry_delay;
        self
    }

    /// Whether a new attempt should follow the failed `attempt_number`.
    pub fn should_retry(&self, attempt_number: u32) -> bool {
        attempt_number >= 1 && attempt_number <= self.max_retries
    }

    /// Delay to wait after the failed `attempt_number` before trying again.
    pub fn backoff_delay(&self, attempt_number: u32) -> Duration {
        match self.backoff {
            BackoffStrategy::Fixed => self.retry_delay,
            BackoffStrategy::Exponential => {
                let exp = attempt_number.saturating_sub(1).min(31);
                let delay = self.retry_delay.saturating_mul(1u32 << exp);
                match self.max_retry_delay {
                    Some(cap) => delay.min(cap),
                    None => delay,
                }
            }
        }
    }
}
