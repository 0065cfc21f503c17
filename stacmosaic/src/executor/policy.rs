//! Retry policy for catalog requests.
//!
//! Only timeouts are retried; every other failure ends the search at once.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use stacmosaic::executor::RetryPolicy;
//!
//! // One retry, half a second after the first timeout
//! let policy = RetryPolicy::fixed(2, Duration::from_millis(500));
//! assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(500)));
//! assert_eq!(policy.delay_for_attempt(2), None);
//! ```

use std::time::Duration;

/// Default initial delay for exponential backoff (250ms).
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 250;

/// Default maximum delay for exponential backoff (10 seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 10;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// How many times a timed-out request is sent, and how long to wait between
/// attempts.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum RetryPolicy {
    /// Give up after the first timeout.
    #[default]
    None,

    /// Constant delay between attempts.
    Fixed {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        delay: Duration,
    },

    /// Delay grows by `multiplier` after each attempt, capped at `max_delay`.
    ExponentialBackoff {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    },
}

impl RetryPolicy {
    /// Exponential backoff with the default delays.
    pub fn exponential(max_attempts: u32) -> Self {
        Self::ExponentialBackoff {
            max_attempts,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed {
            max_attempts,
            delay,
        }
    }

    /// Delay before the next attempt after attempt number `attempt` (1-based)
    /// failed, or `None` when no attempts remain.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Fixed {
                max_attempts,
                delay,
            } => (attempt < *max_attempts).then_some(*delay),
            Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                multiplier,
            } => {
                if attempt >= *max_attempts {
                    return None;
                }
                let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                let delay_ms = (initial_delay.as_millis() as f64 * factor)
                    .min(max_delay.as_millis() as f64);
                Some(Duration::from_millis(delay_ms as u64))
            }
        }
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. } => *max_attempts,
            Self::ExponentialBackoff { max_attempts, .. } => *max_attempts,
        }
    }
}
