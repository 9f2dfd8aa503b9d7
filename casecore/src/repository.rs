//! Loading and committing aggregates.
//!
//! The repository is the only component that talks to the event log on behalf
//! of an aggregate: `load` replays the aggregate's stream through
//! [`Aggregate::apply`], and `commit` performs a single compare-and-append.
//!
//! Stores hold one closed event type (usually a sum type with one variant per
//! aggregate kind). Aggregate events are converted into it with `Into`, and
//! read back with `TryFrom<&StoreEvent>`.

use crate::aggregate::Aggregate;
use crate::errors::{EventStoreError, EventStoreResult};
use crate::event_store::{
    DomainEvent, EventMetadata, EventStore, EventToWrite, ExpectedVersion, StreamEvents,
};
use crate::types::{EventId, EventVersion, StreamId};
use tracing::{debug, instrument, warn};

/// An aggregate reconstructed from its stream, with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedAggregate<A> {
    /// Stream the state was folded from
    pub stream_id: StreamId,
    /// Folded state
    pub state: A,
    /// Version of the last folded event, `None` for an empty stream
    pub version: Option<EventVersion>,
}

impl<A> LoadedAggregate<A> {
    /// Version expectation for committing on top of this load.
    pub const fn expected_version(&self) -> ExpectedVersion {
        ExpectedVersion::from_current(self.version)
    }
}

/// Loads and commits aggregates over an [`EventStore`].
#[derive(Debug, Clone)]
pub struct AggregateRepository<ES> {
    store: ES,
}

impl<ES> AggregateRepository<ES>
where
    ES: EventStore,
{
    /// Creates a repository over the given store.
    pub const fn new(store: ES) -> Self {
        Self { store }
    }

    /// The underlying event store.
    pub const fn store(&self) -> &ES {
        &self.store
    }

    /// Reconstructs the aggregate `id` by folding its full stream.
    ///
    /// An empty stream yields `A::default()` with no version. Loading has no
    /// side effects and can be repeated freely.
    #[instrument(name = "load", skip(self, id), fields(kind = A::KIND, aggregate_id = %id))]
    pub async fn load<A>(&self, id: &A::Id) -> EventStoreResult<LoadedAggregate<A>>
    where
        A: Aggregate,
        for<'a> A::Event: TryFrom<&'a ES::Event>,
    {
        let stream_id = A::stream_id(id)?;
        let data = self.store.read_stream(&stream_id).await?;

        let mut state = A::default();
        for stored in data.events() {
            match A::Event::try_from(&stored.payload) {
                Ok(event) => state.apply(&event),
                Err(_) => warn!(
                    event_type = %stored.event_type,
                    version = %stored.event_version,
                    "skipping event not understood by aggregate"
                ),
            }
        }

        debug!(events = data.len(), "aggregate loaded");
        Ok(LoadedAggregate {
            stream_id,
            state,
            version: data.version,
        })
    }

    /// Appends `events` to the stream of `id` if it is still at `expected`.
    ///
    /// Returns the version of the last appended event.
    ///
    /// # Errors
    ///
    /// `EventStoreError::VersionConflict` when another writer got there first;
    /// `EventStoreError::Internal` for an empty batch.
    #[instrument(
        name = "commit",
        skip(self, id, events, metadata),
        fields(kind = A::KIND, aggregate_id = %id, events = events.len())
    )]
    pub async fn commit<A>(
        &self,
        id: &A::Id,
        expected: ExpectedVersion,
        events: Vec<A::Event>,
        metadata: Option<EventMetadata>,
    ) -> EventStoreResult<EventVersion>
    where
        A: Aggregate,
        A::Event: Into<ES::Event>,
    {
        let stream_id = A::stream_id(id)?;
        if events.is_empty() {
            return Err(EventStoreError::Internal(format!(
                "refusing to commit an empty batch to {stream_id}"
            )));
        }

        let to_write = events
            .into_iter()
            .map(|event| EventToWrite {
                event_id: EventId::new(),
                event_type: event.event_type(),
                payload: event.into(),
                metadata: metadata.clone(),
            })
            .collect();

        let version = self
            .store
            .append(StreamEvents::new(stream_id, expected, to_write))
            .await?;
        debug!(%version, "events committed");
        Ok(version)
    }
}
