//! `casecore` - event-sourced aggregate core
//!
//! Aggregate state is derived only from the ordered, append-only history of
//! its stream. Commands are validated against freshly folded state, and the
//! events they produce are appended with a compare-and-append guard. Losing a
//! race re-runs the whole cycle a bounded number of times.
//!
//! The crate provides the generic pieces:
//!
//! - [`EventStore`]: the per-stream event log port
//! - [`Aggregate`] and [`Handle`]: pure fold and command handling
//! - [`AggregateRepository`]: load by fold, commit with an expected version
//! - [`CommandExecutor`]: load/handle/commit with bounded retry
//! - [`CommandEnvelope`] and [`CommandRoute`]: named command ingress

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod dispatch;
pub mod errors;
pub mod event_store;
pub mod executor;
pub mod repository;
pub mod types;

mod validation;

pub use aggregate::{Aggregate, AggregateCommand, Handle};
pub use dispatch::{CommandEnvelope, CommandRoute};
pub use errors::{
    CommandError, CommandResult, DispatchError, DomainError, EventStoreError, EventStoreResult,
};
pub use event_store::{
    DomainEvent, EventMetadata, EventStore, EventToWrite, ExpectedVersion, StoredEvent,
    StreamData, StreamEvents,
};
pub use executor::{
    CommandExecutor, CommandOutcome, ConfigError, ExecutionContext, ExecutorConfig, RetryConfig,
    RetryPolicy,
};
pub use repository::{AggregateRepository, LoadedAggregate};
pub use types::{CommandName, EventId, EventVersion, StreamId, Timestamp};
