//! Event log access for casecore.
//!
//! This module defines the `EventStore` port: a per-stream, append-only log
//! with a compare-and-append write. Implementations live in other crates
//! (`casecore-memory` for tests and development).

use crate::errors::EventStoreResult;
use crate::types::{EventId, EventVersion, StreamId, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Gives every event payload a stable type name for the log.
pub trait DomainEvent {
    /// Type name recorded alongside the payload, e.g. `"CaseGroupInfoUpdated"`.
    fn event_type(&self) -> &'static str;
}

/// A stored event with full metadata.
///
/// Once appended, an event's position and content never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent<E> {
    /// Unique identifier for this event
    pub event_id: EventId,
    /// The stream this event belongs to
    pub stream_id: StreamId,
    /// The version of this event within its stream
    pub event_version: EventVersion,
    /// Type name of the payload
    pub event_type: String,
    /// When this event was appended
    pub timestamp: Timestamp,
    /// The event payload
    pub payload: E,
    /// Optional metadata for this event
    pub metadata: Option<EventMetadata>,
}

/// Metadata that can be attached to events for tracking and correlation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// ID of the event that caused this event (for causation tracking)
    pub causation_id: Option<EventId>,
    /// ID used to correlate related events across multiple commands
    pub correlation_id: Option<String>,
    /// ID of the user or system that initiated this event
    pub user_id: Option<String>,
    /// Additional custom metadata
    pub custom: HashMap<String, String>,
}

impl EventMetadata {
    /// Creates new empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the causation ID.
    #[must_use]
    pub const fn with_causation_id(mut self, causation_id: EventId) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    /// Sets the correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: String) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Sets the user ID.
    #[must_use]
    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Adds custom metadata.
    #[must_use]
    pub fn with_custom(mut self, key: String, value: String) -> Self {
        self.custom.insert(key, value);
        self
    }
}

/// Expected version for optimistic concurrency control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The stream must be empty
    New,
    /// The stream's last event must have exactly this version
    Exact(EventVersion),
    /// Any version is acceptable (no concurrency control)
    Any,
}

impl ExpectedVersion {
    /// Expectation matching a stream observed at `current`.
    pub const fn from_current(current: Option<EventVersion>) -> Self {
        match current {
            Some(version) => Self::Exact(version),
            None => Self::New,
        }
    }

    /// Whether a stream currently at `current` satisfies this expectation.
    pub fn is_satisfied_by(self, current: Option<EventVersion>) -> bool {
        match self {
            Self::New => current.is_none(),
            Self::Exact(expected) => current == Some(expected),
            Self::Any => true,
        }
    }

    /// The version this expectation names, if any.
    pub const fn as_option(self) -> Option<EventVersion> {
        match self {
            Self::Exact(version) => Some(version),
            Self::New | Self::Any => None,
        }
    }
}

/// An event to be written to the event store.
#[derive(Debug, Clone)]
pub struct EventToWrite<E> {
    /// Unique identifier for this event (must be `UUIDv7`)
    pub event_id: EventId,
    /// Type name of the payload
    pub event_type: &'static str,
    /// The event payload
    pub payload: E,
    /// Optional metadata for this event
    pub metadata: Option<EventMetadata>,
}

impl<E: DomainEvent> EventToWrite<E> {
    /// Creates a new event to write.
    pub fn new(event_id: EventId, payload: E) -> Self {
        Self {
            event_id,
            event_type: payload.event_type(),
            payload,
            metadata: None,
        }
    }

    /// Creates a new event with metadata.
    pub fn with_metadata(event_id: EventId, payload: E, metadata: EventMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::new(event_id, payload)
        }
    }
}

/// Events to append to a single stream under one version expectation.
#[derive(Debug, Clone)]
pub struct StreamEvents<E> {
    /// The target stream
    pub stream_id: StreamId,
    /// The expected version for optimistic concurrency control
    pub expected_version: ExpectedVersion,
    /// The events to write, in order
    pub events: Vec<EventToWrite<E>>,
}

impl<E> StreamEvents<E> {
    /// Creates a new `StreamEvents` instance.
    pub const fn new(
        stream_id: StreamId,
        expected_version: ExpectedVersion,
        events: Vec<EventToWrite<E>>,
    ) -> Self {
        Self {
            stream_id,
            expected_version,
            events,
        }
    }
}

/// Full ordered history of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamData<E> {
    /// Events in version order
    pub events: Vec<StoredEvent<E>>,
    /// Version of the last event, `None` for an empty stream
    pub version: Option<EventVersion>,
}

impl<E> StreamData<E> {
    /// Creates a new `StreamData` instance.
    pub const fn new(events: Vec<StoredEvent<E>>, version: Option<EventVersion>) -> Self {
        Self { events, version }
    }

    /// Data for a stream that has never been written.
    pub const fn empty() -> Self {
        Self {
            events: Vec::new(),
            version: None,
        }
    }

    /// Returns whether any events were found.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the number of events in the stream.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns an iterator over the events.
    pub fn events(&self) -> impl Iterator<Item = &StoredEvent<E>> + '_ {
        self.events.iter()
    }
}

/// The append-only, per-stream event log.
///
/// `append` is a compare-and-append: it succeeds only when the stream's
/// current version satisfies the expectation, and it either writes every
/// event of the batch or none of them.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// The event type this store handles.
    type Event: Send + Sync;

    /// Reads the full ordered history of a stream.
    ///
    /// A stream that has never been written yields empty `StreamData`.
    async fn read_stream(&self, stream_id: &StreamId) -> EventStoreResult<StreamData<Self::Event>>;

    /// Appends events to one stream with optimistic concurrency control.
    ///
    /// Returns the version of the last event written.
    ///
    /// # Errors
    /// * `EventStoreError::VersionConflict` - the expected version doesn't match
    /// * `EventStoreError::ConnectionFailed` / `Unavailable` - the log is unreachable
    async fn append(
        &self,
        stream_events: StreamEvents<Self::Event>,
    ) -> EventStoreResult<EventVersion>;

    /// Gets the current version of a stream, `None` if it has no events.
    async fn stream_version(&self, stream_id: &StreamId) -> EventStoreResult<Option<EventVersion>>;
}

#[async_trait]
impl<S> EventStore for std::sync::Arc<S>
where
    S: EventStore + ?Sized,
{
    type Event = S::Event;

    async fn read_stream(&self, stream_id: &StreamId) -> EventStoreResult<StreamData<Self::Event>> {
        (**self).read_stream(stream_id).await
    }

    async fn append(
        &self,
        stream_events: StreamEvents<Self::Event>,
    ) -> EventStoreResult<EventVersion> {
        (**self).append(stream_events).await
    }

    async fn stream_version(&self, stream_id: &StreamId) -> EventStoreResult<Option<EventVersion>> {
        (**self).stream_version(stream_id).await
    }
}
