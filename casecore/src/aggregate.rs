//! Aggregates: pure state machines over one event stream.
//!
//! An aggregate folds the events of its stream into a state value
//! ([`Aggregate::apply`]) and validates commands against that state
//! ([`Handle::handle`]). Neither step performs I/O, reads the clock or draws
//! random numbers, so the same stream always folds to the same state and the
//! same command against the same state always yields the same events.
//!
//! # Example
//!
//! ```rust,ignore
//! #[derive(Debug, Clone, Default)]
//! struct Hearing {
//!     status: ListingStatus,
//! }
//!
//! impl Aggregate for Hearing {
//!     const KIND: &'static str = "hearing";
//!     type Id = HearingId;
//!     type Event = HearingEvent;
//!
//!     fn apply(&mut self, event: &Self::Event) {
//!         if let HearingEvent::ListingStatusChanged(changed) = event {
//!             self.status = changed.status;
//!         }
//!     }
//! }
//!
//! impl Handle<UpdateListingStatus> for Hearing {
//!     fn handle(&self, command: &UpdateListingStatus) -> Result<Vec<HearingEvent>, DomainError> {
//!         if self.status.is_terminal() {
//!             return Ok(vec![]);
//!         }
//!         Ok(vec![HearingEvent::ListingStatusChanged(/* ... */)])
//!     }
//! }
//! ```

use crate::errors::{DomainError, EventStoreError, EventStoreResult};
use crate::event_store::DomainEvent;
use crate::types::StreamId;
use std::fmt::Display;

/// A state machine reconstructed from the events of one stream.
///
/// Every `load` produces a fresh, independently owned value; aggregates are
/// never shared across command-handling cycles.
pub trait Aggregate: Default + Clone + Send + Sync {
    /// Stream prefix for this aggregate kind, e.g. `"hearing"`.
    ///
    /// Combined with the aggregate id to form the stream id.
    const KIND: &'static str;

    /// Identifier of one aggregate instance.
    type Id: Display + Send + Sync;

    /// Events this aggregate folds and emits.
    type Event: DomainEvent + Clone + Send + Sync;

    /// Applies one event to the state.
    ///
    /// Must be total: events that carry no information for this state are
    /// ignored rather than rejected.
    fn apply(&mut self, event: &Self::Event);

    /// Folds a full history starting from the initial state.
    fn fold<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a Self::Event>,
        Self::Event: 'a,
    {
        Self::fold_from(Self::default(), events)
    }

    /// Continues a fold from an already reconstructed state.
    ///
    /// `fold_from(fold(a), b) == fold(a ++ b)` for every split of a stream.
    fn fold_from<'a, I>(seed: Self, events: I) -> Self
    where
        I: IntoIterator<Item = &'a Self::Event>,
        Self::Event: 'a,
    {
        let mut state = seed;
        for event in events {
            state.apply(event);
        }
        state
    }

    /// Stream holding the history of the aggregate `id`.
    fn stream_id(id: &Self::Id) -> EventStoreResult<StreamId> {
        StreamId::try_new(format!("{}-{id}", Self::KIND))
            .map_err(|e| EventStoreError::Internal(format!("invalid stream id for {id}: {e}")))
    }
}

/// Command handling for one command type.
///
/// `handle` never mutates the state; it returns the events that, once
/// appended and folded, produce the next state. An empty vector means the
/// command is already satisfied by the current state.
pub trait Handle<C>: Aggregate {
    /// Decides which events the command produces.
    ///
    /// # Errors
    ///
    /// Returns a [`DomainError`] when the command is illegal for the current
    /// state. Nothing is persisted in that case.
    fn handle(&self, command: &C) -> Result<Vec<Self::Event>, DomainError>;
}

/// A command that names the aggregate it addresses.
///
/// The target is extracted from the command alone, so routing never needs
/// to load state.
pub trait AggregateCommand: Sized {
    /// The aggregate kind handling this command.
    type Aggregate: Handle<Self>;

    /// Identifier of the addressed aggregate instance.
    fn aggregate_id(&self) -> <Self::Aggregate as Aggregate>::Id;
}
