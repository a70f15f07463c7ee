//! # Retry Policy and Backoff Strategies
//!
//! Decides how many attempts a queued mutation gets and how long an automatic
//! pass waits before trying it again. Forced passes ignore the wait.
//!
//! ## Usage
//!
//! ```rust
//! use practice_sync::offline::retry::{BackoffStrategy, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, BackoffStrategy::Fixed { interval_seconds: 5 });
//! assert_eq!(policy.delay_for(1).as_secs(), 5);
//! assert!(policy.is_exhausted(3));
//! ```

use crate::shared::config::{SyncConfig, DEFAULT_MAX_RETRIES};
use rand::Rng;
use std::time::Duration;

/// Backoff strategy configuration
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Retry on the next pass
    Immediate,
    /// Fixed interval between retries
    Fixed {
        /// Interval in seconds
        interval_seconds: u64,
    },
    /// Exponential backoff with jitter
    Exponential {
        /// Base interval in seconds
        base_interval: u64,
        /// Maximum interval in seconds
        max_interval: u64,
        /// Jitter factor (0.0 to 1.0)
        jitter: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential {
            base_interval: 1,
            max_interval: 300, // 5 minutes
            jitter: 0.1,
        }
    }
}

/// Retry budget plus backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Failed attempts after which an entry is abandoned
    pub max_retries: u32,
    pub strategy: BackoffStrategy,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, strategy: BackoffStrategy) -> Self {
        Self {
            max_retries,
            strategy,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.max_retries,
            BackoffStrategy::Exponential {
                base_interval: config.backoff_base_secs,
                max_interval: config.backoff_max_secs,
                jitter: config.backoff_jitter,
            },
        )
    }

    /// Whether `retry_count` failed attempts use up the budget
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }

    /// Wait before the attempt following failure number `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let seconds = match &self.strategy {
            BackoffStrategy::Immediate => 0,
            BackoffStrategy::Fixed { interval_seconds } => *interval_seconds,
            BackoffStrategy::Exponential {
                base_interval,
                max_interval,
                jitter,
            } => {
                let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
                let delay = (*base_interval).saturating_mul(factor).min(*max_interval);

                let jitter_amount = (delay as f64 * (*jitter).clamp(0.0, 1.0)) as u64;
                if jitter_amount > 0 {
                    delay + rand::thread_rng().gen_range(0..jitter_amount)
                } else {
                    delay
                }
            }
        };

        Duration::from_secs(seconds)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, BackoffStrategy::default())
    }
}
