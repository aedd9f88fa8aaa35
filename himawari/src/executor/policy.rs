//! Retry policy for work units.
//!
//! Retries use a fixed cooldown between attempts. There is no backoff: the
//! cooldown only keeps a failing unit from hammering the remote source.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use himawari::executor::RetryPolicy;
//!
//! let policy = RetryPolicy::fixed(5, Duration::from_secs(1));
//! assert_eq!(policy.max_attempts(), 5);
//! assert_eq!(policy.cooldown(), Duration::from_secs(1));
//! ```

use std::time::Duration;

/// Default number of attempts per unit (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default cooldown between attempts (1 second).
pub const DEFAULT_COOLDOWN_MS: u64 = 1000;

/// How a work unit handles failed attempts.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Single attempt, no retries.
    #[default]
    None,

    /// Up to `max_attempts` attempts with a constant cooldown between them.
    Fixed {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Pause after a failed attempt before the next one.
        cooldown: Duration,
    },
}

impl RetryPolicy {
    /// Creates a fixed retry policy.
    pub fn fixed(max_attempts: u32, cooldown: Duration) -> Self {
        Self::Fixed {
            max_attempts,
            cooldown,
        }
    }

    /// Fixed policy with [`DEFAULT_MAX_ATTEMPTS`] and [`DEFAULT_COOLDOWN_MS`].
    pub fn standard() -> Self {
        Self::fixed(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_COOLDOWN_MS),
        )
    }

    /// Returns the maximum number of attempts for this policy.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. } => *max_attempts,
        }
    }

    /// Returns the pause between attempts.
    pub fn cooldown(&self) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed { cooldown, .. } => *cooldown,
        }
    }

    /// Returns the delay to wait after the given failed attempt (1-based), or
    /// `None` if no attempt follows it.
    pub fn delay_after_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt < self.max_attempts() {
            Some(self.cooldown())
        } else {
            None
        }
    }
}
