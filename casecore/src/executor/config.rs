//! Validated executor configuration.
//!
//! Every tunable is a `nutype` with its own bounds, so a configuration that
//! deserialises is a configuration the executor can run with. Configurations
//! are usually loaded from JSON with [`ExecutorConfig::from_json`].

use super::retry::{RetryConfig, RetryPolicy};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Maximum number of attempts per command, including the first.
///
/// Validated to be between 1 and 10 attempts.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10),
    default = 3,
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Default,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct MaxRetryAttempts(u32);

/// Base delay between retry attempts in milliseconds.
///
/// Zero disables backoff entirely.
#[nutype(
    validate(less_or_equal = 10_000),
    default = 100,
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Default,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct RetryBaseDelayMs(u64);

impl RetryBaseDelayMs {
    /// Convert to Duration for use with `tokio::time::sleep`.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into_inner())
    }
}

/// Maximum delay between retry attempts in milliseconds.
#[nutype(
    validate(less_or_equal = 300_000),
    default = 30_000,
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Default,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct RetryMaxDelayMs(u64);

impl RetryMaxDelayMs {
    /// Convert to Duration for use with `tokio::time::sleep`.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into_inner())
    }
}

/// Exponential backoff multiplier for retry delays.
#[nutype(
    validate(greater_or_equal = 1.1, less_or_equal = 3.0),
    default = 2.0,
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        PartialOrd,
        Default,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct BackoffMultiplier(f64);

/// Event store operation timeout in milliseconds.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 600_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct EventStoreTimeoutMs(u64);

impl EventStoreTimeoutMs {
    /// Convert to Duration for use with `tokio::time::timeout`.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into_inner())
    }
}

/// Errors raised while loading an [`ExecutorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON or a field is out of range.
    #[error("Invalid executor configuration: {0}")]
    Invalid(#[from] serde_json::Error),

    /// `max_delay_ms` is below `base_delay_ms`.
    #[error("max_delay_ms ({max}) must not be lower than base_delay_ms ({base})")]
    DelayBoundsInverted {
        /// Configured base delay
        base: u64,
        /// Configured maximum delay
        max: u64,
    },
}

/// Executor configuration with type-safe validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum attempts per command.
    pub max_attempts: MaxRetryAttempts,
    /// Base delay between retry attempts.
    pub base_delay_ms: RetryBaseDelayMs,
    /// Maximum delay between retry attempts.
    pub max_delay_ms: RetryMaxDelayMs,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: BackoffMultiplier,
    /// Also retry connection failures, unavailability and timeouts.
    pub retry_transient_errors: bool,
    /// Timeout for event store reads. Appends are never cut short.
    pub event_store_timeout_ms: Option<EventStoreTimeoutMs>,
}

impl ExecutorConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        let base = self.base_delay_ms.into_inner();
        let max = self.max_delay_ms.into_inner();
        if max < base {
            return Err(ConfigError::DelayBoundsInverted { base, max });
        }
        Ok(self)
    }

    /// Retry timing for the executor.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.into_inner(),
            base_delay: self.base_delay_ms.as_duration(),
            max_delay: self.max_delay_ms.as_duration(),
            backoff_multiplier: self.backoff_multiplier.into_inner(),
        }
    }

    /// Which failures the executor retries.
    pub const fn retry_policy(&self) -> RetryPolicy {
        if self.retry_transient_errors {
            RetryPolicy::ConcurrencyAndTransient
        } else {
            RetryPolicy::ConcurrencyConflictsOnly
        }
    }

    /// Store read timeout, if configured.
    pub fn event_store_timeout(&self) -> Option<Duration> {
        self.event_store_timeout_ms.map(EventStoreTimeoutMs::as_duration)
    }
}

impl From<&ExecutorConfig> for RetryConfig {
    fn from(config: &ExecutorConfig) -> Self {
        config.retry_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_match_retry_config_defaults() {
        let config = ExecutorConfig::default();
        let retry = config.retry_config();
        let expected = RetryConfig::default();

        assert_eq!(retry.max_attempts, expected.max_attempts);
        assert_eq!(retry.base_delay, expected.base_delay);
        assert_eq!(retry.max_delay, expected.max_delay);
        assert!(matches!(
            config.retry_policy(),
            RetryPolicy::ConcurrencyConflictsOnly
        ));
        assert_eq!(config.event_store_timeout(), None);
    }

    #[test]
    fn loads_partial_json_with_defaults() {
        let config = ExecutorConfig::from_json(
            r#"{ "max_attempts": 5, "retry_transient_errors": true, "event_store_timeout_ms": 2500 }"#,
        )
        .unwrap();

        assert_eq!(config.max_attempts.into_inner(), 5);
        assert_eq!(config.base_delay_ms.into_inner(), 100);
        assert!(matches!(
            config.retry_policy(),
            RetryPolicy::ConcurrencyAndTransient
        ));
        assert_eq!(
            config.event_store_timeout(),
            Some(Duration::from_millis(2500))
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(ExecutorConfig::from_json(r#"{ "max_attempts": 0 }"#).is_err());
        assert!(ExecutorConfig::from_json(r#"{ "max_attempts": 11 }"#).is_err());
        assert!(ExecutorConfig::from_json(r#"{ "backoff_multiplier": 5.0 }"#).is_err());
    }

    #[test]
    fn rejects_inverted_delay_bounds() {
        let err = ExecutorConfig::from_json(r#"{ "base_delay_ms": 5000, "max_delay_ms": 1000 }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DelayBoundsInverted {
                base: 5000,
                max: 1000
            }
        ));
    }

    #[test]
    fn survives_json_round_trip() {
        let config = ExecutorConfig::from_json(r#"{ "max_attempts": 7 }"#).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(ExecutorConfig::from_json(&json).unwrap(), config);
    }

    proptest! {
        #[test]
        fn max_attempts_accepts_exactly_one_to_ten(attempts in 0u32..20) {
            prop_assert_eq!(
                MaxRetryAttempts::try_new(attempts).is_ok(),
                (1..=10).contains(&attempts)
            );
        }
    }
}
