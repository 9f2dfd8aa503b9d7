//! Retry logic and policies for command execution.
//!
//! Retries re-run the whole load/handle/commit cycle against freshly loaded
//! state; a stale state is never re-committed.

use crate::errors::{CommandError, EventStoreError};
use rand::Rng;
use std::time::Duration;

/// Configuration for command execution retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay between retry attempts.
    pub base_delay: Duration,
    /// Maximum delay between retry attempts (for exponential backoff).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Retry immediately, without backoff. Used by tests and in-process stores.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// Exponential backoff capped at `max_delay`, with ±25% jitter so that
    /// writers colliding on one stream spread out.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay_ms = self.base_delay.as_millis() as f64;
        let max_delay_ms = self.max_delay.as_millis() as f64;
        if base_delay_ms <= 0.0 {
            return Duration::ZERO;
        }

        let delay = base_delay_ms * self.backoff_multiplier.powi(attempt as i32);
        let delay = delay.min(max_delay_ms);

        let jitter = delay * 0.25 * (rand::rng().random::<f64>() - 0.5) * 2.0;
        let final_delay = (delay + jitter).max(0.0).min(max_delay_ms) as u64;

        Duration::from_millis(final_delay)
    }
}

/// Policy defining which errors should trigger a retry.
///
/// Domain rejections are never retried, whatever the policy says.
#[derive(Debug, Clone, Default)]
pub enum RetryPolicy {
    /// Only retry on concurrency conflicts.
    #[default]
    ConcurrencyConflictsOnly,
    /// Retry on concurrency conflicts and transient infrastructure errors.
    ConcurrencyAndTransient,
    /// Custom policy with user-defined predicate.
    Custom(fn(&CommandError) -> bool),
}

impl RetryPolicy {
    /// Determines if an error should trigger a retry.
    pub fn should_retry(&self, error: &CommandError) -> bool {
        if matches!(error, CommandError::Domain(_)) {
            return false;
        }
        match self {
            Self::ConcurrencyConflictsOnly => {
                matches!(error, CommandError::ConcurrencyConflict { .. })
            }
            Self::ConcurrencyAndTransient => matches!(
                error,
                CommandError::ConcurrencyConflict { .. }
                    | CommandError::EventStore(
                        EventStoreError::ConnectionFailed(_)
                            | EventStoreError::Unavailable(_)
                            | EventStoreError::Timeout(_)
                    )
            ),
            Self::Custom(predicate) => predicate(error),
        }
    }
}
