//! Command execution with optimistic concurrency and bounded retry.
//!
//! One execution is a load/handle/commit cycle against a single aggregate
//! stream. When the commit loses a race the whole cycle is repeated against
//! freshly loaded state, up to the configured number of attempts. Domain
//! rejections are returned as outcomes and never retried; infrastructure
//! failures propagate to the caller.
//!
//! Commands that touch several streams are composed by the caller as a fixed
//! sequence of single-stream executions, combined with
//! [`CommandOutcome::merge`].

mod config;
mod context;
mod retry;

pub use config::{
    BackoffMultiplier, ConfigError, EventStoreTimeoutMs, ExecutorConfig, MaxRetryAttempts,
    RetryBaseDelayMs, RetryMaxDelayMs,
};
pub use context::ExecutionContext;
pub use retry::{RetryConfig, RetryPolicy};

use crate::aggregate::{Aggregate, AggregateCommand, Handle};
use crate::errors::{CommandError, CommandResult, DomainError, EventStoreError, EventStoreResult};
use crate::event_store::{EventMetadata, EventStore};
use crate::repository::AggregateRepository;
use crate::types::StreamId;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// What became of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome<E> {
    /// The command was applied. `events` lists what was appended, per stream,
    /// in commit order; it is empty when the command was already satisfied.
    Accepted {
        /// Appended events with the stream each went to
        events: Vec<(StreamId, E)>,
    },
    /// An aggregate refused the command. Nothing was appended by the refused step.
    Rejected(DomainError),
    /// Every attempt lost the race for `stream`.
    ConcurrencyExhausted {
        /// The contended stream
        stream: StreamId,
        /// Attempts made before giving up
        attempts: u32,
    },
}

impl<E> CommandOutcome<E> {
    /// An accepted outcome with no events.
    pub const fn unchanged() -> Self {
        Self::Accepted { events: Vec::new() }
    }

    /// Whether the command was applied (possibly as a no-op).
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Events appended by an accepted command; empty otherwise.
    pub fn events(&self) -> &[(StreamId, E)] {
        match self {
            Self::Accepted { events } => events,
            Self::Rejected(_) | Self::ConcurrencyExhausted { .. } => &[],
        }
    }

    /// Appends the outcome of the next step of a multi-stream command.
    ///
    /// An accepted `self` absorbs the events of `next`, or becomes `next` when
    /// that step was not accepted. A non-accepted `self` is kept as is.
    ///
    /// Events of earlier steps are dropped from a failed outcome even though
    /// they stay committed in the store.
    #[must_use]
    pub fn merge(self, next: Self) -> Self {
        match (self, next) {
            (Self::Accepted { mut events }, Self::Accepted { events: more }) => {
                events.extend(more);
                Self::Accepted { events }
            }
            (Self::Accepted { .. }, stopped) => stopped,
            (stopped, _) => stopped,
        }
    }
}

/// Runs commands against aggregates stored in `ES`.
#[derive(Debug, Clone)]
pub struct CommandExecutor<ES> {
    repository: AggregateRepository<ES>,
    retry_config: RetryConfig,
    retry_policy: RetryPolicy,
    store_timeout: Option<Duration>,
}

impl<ES> CommandExecutor<ES>
where
    ES: EventStore,
    ES::Event: Clone,
{
    /// Creates an executor with the default retry configuration.
    pub fn new(store: ES) -> Self {
        Self {
            repository: AggregateRepository::new(store),
            retry_config: RetryConfig::default(),
            retry_policy: RetryPolicy::default(),
            store_timeout: None,
        }
    }

    /// Creates an executor from a validated configuration.
    pub fn with_config(store: ES, config: &ExecutorConfig) -> Self {
        Self {
            repository: AggregateRepository::new(store),
            retry_config: config.retry_config(),
            retry_policy: config.retry_policy(),
            store_timeout: config.event_store_timeout(),
        }
    }

    /// Replaces the retry timing.
    #[must_use]
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// The repository used for loads and commits.
    pub const fn repository(&self) -> &AggregateRepository<ES> {
        &self.repository
    }

    /// The retry timing in effect.
    pub const fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    /// Executes `command` against the aggregate `id`.
    ///
    /// # Errors
    ///
    /// Infrastructure failures that the retry policy does not cover, or that
    /// persist through every attempt.
    #[instrument(
        name = "execute",
        skip(self, id, command, context),
        fields(
            kind = A::KIND,
            aggregate_id = %id,
            command = std::any::type_name::<C>(),
            correlation_id = %context.correlation_id,
        )
    )]
    pub async fn execute<A, C>(
        &self,
        id: &A::Id,
        command: &C,
        context: &ExecutionContext,
    ) -> EventStoreResult<CommandOutcome<ES::Event>>
    where
        A: Handle<C>,
        A::Event: Into<ES::Event>,
        for<'a> A::Event: TryFrom<&'a ES::Event>,
        C: Sync,
    {
        let stream_id = A::stream_id(id)?;
        let metadata = context.event_metadata();
        let max_attempts = self.retry_config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self
                .attempt::<A, C>(id, &stream_id, command, &metadata)
                .await
            {
                Ok(outcome) => {
                    debug!(attempt, events = outcome.events().len(), "command accepted");
                    return Ok(outcome);
                }
                Err(CommandError::Domain(reason)) => {
                    info!(%reason, "command rejected");
                    return Ok(CommandOutcome::Rejected(reason));
                }
                Err(error) if attempt < max_attempts && self.retry_policy.should_retry(&error) => {
                    let delay = self.retry_config.delay_for_attempt(attempt - 1);
                    warn!(attempt, max_attempts, ?delay, %error, "retrying command");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(CommandError::ConcurrencyConflict { streams }) => {
                    warn!(attempts = attempt, ?streams, "retries exhausted");
                    return Ok(CommandOutcome::ConcurrencyExhausted {
                        stream: stream_id,
                        attempts: attempt,
                    });
                }
                Err(CommandError::EventStore(error)) => return Err(error),
            }
        }
    }

    /// Executes a command against the aggregate it addresses.
    pub async fn submit<C>(
        &self,
        command: &C,
        context: &ExecutionContext,
    ) -> EventStoreResult<CommandOutcome<ES::Event>>
    where
        C: AggregateCommand + Sync,
        <C::Aggregate as Aggregate>::Event: Into<ES::Event>,
        for<'a> <C::Aggregate as Aggregate>::Event: TryFrom<&'a ES::Event>,
    {
        let id = command.aggregate_id();
        self.execute::<C::Aggregate, C>(&id, command, context).await
    }

    async fn attempt<A, C>(
        &self,
        id: &A::Id,
        stream_id: &StreamId,
        command: &C,
        metadata: &EventMetadata,
    ) -> CommandResult<CommandOutcome<ES::Event>>
    where
        A: Handle<C>,
        A::Event: Into<ES::Event>,
        for<'a> A::Event: TryFrom<&'a ES::Event>,
        C: Sync,
    {
        let loaded = self.bounded(self.repository.load::<A>(id)).await?;
        let events = loaded.state.handle(command)?;
        if events.is_empty() {
            return Ok(CommandOutcome::unchanged());
        }

        let appended = events
            .iter()
            .cloned()
            .map(|event| (stream_id.clone(), event.into()))
            .collect();
        // Appends run to completion: a write cut off by a timeout may still
        // have landed in the log.
        self.repository
            .commit::<A>(id, loaded.expected_version(), events, Some(metadata.clone()))
            .await?;

        Ok(CommandOutcome::Accepted { events: appended })
    }

    /// Applies the configured store timeout to a read.
    async fn bounded<T, F>(&self, operation: F) -> EventStoreResult<T>
    where
        F: Future<Output = EventStoreResult<T>>,
    {
        match self.store_timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| EventStoreError::Timeout(limit))?,
            None => operation.await,
        }
    }
}
