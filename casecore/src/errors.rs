//! Error types for casecore.
//!
//! Errors are split by layer so that callers can tell apart outcomes that
//! must never be persisted (domain rejections), outcomes that are retried
//! (concurrency conflicts) and outcomes that abort the current command
//! (infrastructure failures).
//!
//! - **DomainError**: a command was refused by an aggregate's `handle`
//! - **EventStoreError**: storage and persistence layer failures
//! - **CommandError**: what a single load/handle/commit cycle can fail with
//! - **DispatchError**: a command envelope could not be routed to a handler

use crate::types::{EventVersion, StreamId};
use thiserror::Error;

/// Business outcome of an aggregate refusing a command.
///
/// Returned by `Handle::handle` instead of events. Domain errors are recovered
/// locally: nothing is appended and the caller sees a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The command carried arguments that are illegal for the current state.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A business rule prevents the operation.
    #[error("Business rule violation: {0}")]
    BusinessRuleViolation(String),

    /// The addressed entity has never been created.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Errors that can occur when interacting with the event log.
///
/// # Retry Strategy
///
/// Only `VersionConflict` is transient by nature; it is recovered by
/// re-loading the stream and re-evaluating the command. Everything else is an
/// infrastructure failure and is propagated to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventStoreError {
    /// A compare-and-append found the stream at a different version.
    #[error(
        "Version conflict on stream '{stream}': expected {expected}, but current is {current}"
    )]
    VersionConflict {
        /// The stream with the version conflict
        stream: StreamId,
        /// The version the writer expected (`none` for a new stream)
        expected: VersionDisplay,
        /// The version the stream is actually at (`none` when empty)
        current: VersionDisplay,
    },

    /// The connection to the event log failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The event log is temporarily unavailable.
    #[error("Event store unavailable: {0}")]
    Unavailable(String),

    /// A timeout occurred while waiting for the operation.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EventStoreError {
    /// Whether this error is the compare-and-append guard rejecting a stale write.
    pub const fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Builds a version conflict from optional stream versions.
    pub fn version_conflict(
        stream: StreamId,
        expected: Option<EventVersion>,
        current: Option<EventVersion>,
    ) -> Self {
        Self::VersionConflict {
            stream,
            expected: VersionDisplay(expected),
            current: VersionDisplay(current),
        }
    }
}

/// Optional stream version rendered as `none` when the stream is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionDisplay(pub Option<EventVersion>);

impl std::fmt::Display for VersionDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(version) => version.fmt(f),
            None => f.write_str("none"),
        }
    }
}

/// Errors that can occur during one load/handle/commit cycle.
///
/// The executor inspects this classification to decide whether to retry.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// The aggregate refused the command.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Optimistic concurrency control detected conflicting updates.
    #[error("Concurrency conflict on streams: {streams:?}")]
    ConcurrencyConflict {
        /// The streams that had version conflicts
        streams: Vec<StreamId>,
    },

    /// An error occurred in the event store while executing the command.
    #[error("Event store error: {0}")]
    EventStore(EventStoreError),
}

impl From<EventStoreError> for CommandError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::VersionConflict { stream, .. } => Self::ConcurrencyConflict {
                streams: vec![stream],
            },
            other => Self::EventStore(other),
        }
    }
}

/// Errors raised while routing a command envelope to its handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No handler declares this command name.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The payload could not be decoded into the handler's command type.
    #[error("Invalid payload for command {command}: {detail}")]
    InvalidPayload {
        /// The command being decoded
        command: String,
        /// Decoder message
        detail: String,
    },

    /// Neither the payload nor the envelope hint identified the target aggregate.
    #[error("Command {0} does not identify a target aggregate")]
    MissingAggregateId(String),
}

/// Type alias for event store results.
pub type EventStoreResult<T> = Result<T, EventStoreError>;

/// Type alias for the result of a single command cycle.
pub type CommandResult<T> = Result<T, CommandError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(name: &str) -> StreamId {
        StreamId::try_new(name).unwrap()
    }

    #[test]
    fn domain_error_messages_are_descriptive() {
        let err = DomainError::ValidationFailed("organisation mismatch".to_string());
        assert_eq!(err.to_string(), "Validation failed: organisation mismatch");

        let err = DomainError::NotFound("hearing-1".to_string());
        assert_eq!(err.to_string(), "Not found: hearing-1");
    }

    #[test]
    fn version_conflict_message_renders_missing_versions() {
        let err = EventStoreError::version_conflict(
            stream("case-1"),
            None,
            Some(EventVersion::try_new(4).unwrap()),
        );
        assert_eq!(
            err.to_string(),
            "Version conflict on stream 'case-1': expected none, but current is 4"
        );
        assert!(err.is_version_conflict());
    }

    #[test]
    fn version_conflict_converts_to_concurrency_conflict() {
        let err = EventStoreError::version_conflict(stream("case-1"), None, None);
        match CommandError::from(err) {
            CommandError::ConcurrencyConflict { streams } => {
                assert_eq!(streams, vec![stream("case-1")]);
            }
            other => panic!("Expected ConcurrencyConflict, got {other:?}"),
        }
    }

    #[test]
    fn infrastructure_failures_stay_event_store_errors() {
        let err = EventStoreError::Unavailable("log offline".to_string());
        assert!(!err.is_version_conflict());
        match CommandError::from(err) {
            CommandError::EventStore(EventStoreError::Unavailable(msg)) => {
                assert_eq!(msg, "log offline");
            }
            other => panic!("Expected EventStore variant, got {other:?}"),
        }
    }

    #[test]
    fn domain_error_is_transparent_inside_command_error() {
        let err: CommandError = DomainError::BusinessRuleViolation("locked".to_string()).into();
        assert_eq!(err.to_string(), "Business rule violation: locked");
    }
}
