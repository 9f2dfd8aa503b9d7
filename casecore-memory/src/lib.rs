//! In-memory adapter for the `casecore` event log
//!
//! This crate provides an in-memory implementation of the `EventStore` trait
//! from the casecore crate, useful for testing and development scenarios
//! where persistence is not required.
//!
//! Appends are compare-and-append under a single write lock, so a batch is
//! either written whole or rejected with a version conflict. Committed events
//! are also published, in commit order, to every [`subscribe`] receiver.
//!
//! [`subscribe`]: InMemoryEventStore::subscribe

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening, clippy::cast_possible_truncation)]

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use casecore::errors::{EventStoreError, EventStoreResult};
use casecore::event_store::{EventStore, StoredEvent, StreamData, StreamEvents};
use casecore::types::{EventVersion, StreamId, Timestamp};
use tokio::sync::broadcast;
use tracing::{debug, trace};

const SUBSCRIPTION_CAPACITY: usize = 1024;

/// A committed event together with its position in the global commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEvent<E> {
    /// Position in the store-wide commit order, starting at 0
    pub sequence: u64,
    /// The stored event
    pub event: StoredEvent<E>,
}

struct StoreState<E> {
    streams: HashMap<StreamId, Vec<StoredEvent<E>>>,
    // Every event in commit order
    log: Vec<StoredEvent<E>>,
}

impl<E> Default for StoreState<E> {
    fn default() -> Self {
        Self {
            streams: HashMap::new(),
            log: Vec::new(),
        }
    }
}

impl<E> StoreState<E> {
    fn version_of(&self, stream_id: &StreamId) -> Option<EventVersion> {
        self.streams
            .get(stream_id)
            .and_then(|events| events.last())
            .map(|event| event.event_version)
    }
}

/// Thread-safe in-memory event store for testing
///
/// Clones share the same storage and subscription channel.
#[derive(Clone)]
pub struct InMemoryEventStore<E>
where
    E: Send + Sync + Clone + 'static,
{
    state: Arc<RwLock<StoreState<E>>>,
    committed: broadcast::Sender<CommittedEvent<E>>,
}

impl<E> InMemoryEventStore<E>
where
    E: Send + Sync + Clone + 'static,
{
    /// Create a new empty in-memory event store
    pub fn new() -> Self {
        let (committed, _) = broadcast::channel(SUBSCRIPTION_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            committed,
        }
    }

    /// Receives every event committed after this call, in commit order.
    ///
    /// A receiver that falls more than 1024 events behind observes
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<CommittedEvent<E>> {
        self.committed.subscribe()
    }

    /// Every stored event across all streams, in commit order.
    pub fn all_events(&self) -> EventStoreResult<Vec<StoredEvent<E>>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.log.clone())
    }

    /// Ids of every stream holding at least one event.
    pub fn stream_ids(&self) -> EventStoreResult<Vec<StreamId>> {
        let state = self.state.read().map_err(poisoned)?;
        let mut ids: Vec<_> = state.streams.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

impl<E> Default for InMemoryEventStore<E>
where
    E: Send + Sync + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for InMemoryEventStore<E>
where
    E: Send + Sync + Clone + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventStore")
            .field("subscribers", &self.committed.receiver_count())
            .finish_non_exhaustive()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> EventStoreError {
    EventStoreError::Internal("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl<E> EventStore for InMemoryEventStore<E>
where
    E: Send + Sync + Clone + 'static,
{
    type Event = E;

    async fn read_stream(&self, stream_id: &StreamId) -> EventStoreResult<StreamData<Self::Event>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.streams.get(stream_id).map_or_else(StreamData::empty, |events| {
            StreamData::new(events.clone(), events.last().map(|e| e.event_version))
        }))
    }

    async fn append(
        &self,
        stream_events: StreamEvents<Self::Event>,
    ) -> EventStoreResult<EventVersion> {
        let StreamEvents {
            stream_id,
            expected_version,
            events,
        } = stream_events;

        let mut state = self.state.write().map_err(poisoned)?;

        let current = state.version_of(&stream_id);
        if !expected_version.is_satisfied_by(current) {
            debug!(stream = %stream_id, ?expected_version, ?current, "append rejected");
            return Err(EventStoreError::version_conflict(
                stream_id,
                expected_version.as_option(),
                current,
            ));
        }
        if events.is_empty() {
            return Err(EventStoreError::Internal(format!(
                "empty append to {stream_id}"
            )));
        }

        let mut version = EventVersion::following(current);
        let mut last_version = version;
        let mut stored = Vec::with_capacity(events.len());
        for event in events {
            last_version = version;
            stored.push(StoredEvent {
                event_id: event.event_id,
                stream_id: stream_id.clone(),
                event_version: version,
                event_type: event.event_type.to_string(),
                timestamp: Timestamp::now(),
                payload: event.payload,
                metadata: event.metadata,
            });
            version = version.next();
        }

        for event in &stored {
            let sequence = state.log.len() as u64;
            state.log.push(event.clone());
            // No receivers is not an error for the writer.
            let _ = self.committed.send(CommittedEvent {
                sequence,
                event: event.clone(),
            });
        }
        state
            .streams
            .entry(stream_id.clone())
            .or_default()
            .extend(stored);

        trace!(stream = %stream_id, version = %last_version, "events appended");
        Ok(last_version)
    }

    async fn stream_version(&self, stream_id: &StreamId) -> EventStoreResult<Option<EventVersion>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.version_of(stream_id))
    }
}
