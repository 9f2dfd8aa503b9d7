//! Concurrent command execution against one stream.

use async_trait::async_trait;
use casecore::{
    Aggregate, AggregateRepository, CommandExecutor, CommandOutcome, DomainError, DomainEvent,
    EventStore, EventStoreResult, EventVersion, ExecutionContext, ExpectedVersion, Handle,
    RetryConfig, StreamData, StreamEvents, StreamId,
};
use casecore_memory::InMemoryEventStore;
use futures::future::join_all;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Deposited(u64);

impl DomainEvent for Deposited {
    fn event_type(&self) -> &'static str {
        "Deposited"
    }
}

impl TryFrom<&Deposited> for Deposited {
    type Error = std::convert::Infallible;

    fn try_from(event: &Deposited) -> Result<Self, Self::Error> {
        Ok(event.clone())
    }
}

#[derive(Debug, Clone, Default)]
struct Account {
    balance: u64,
}

impl Aggregate for Account {
    const KIND: &'static str = "account";
    type Id = &'static str;
    type Event = Deposited;

    fn apply(&mut self, event: &Deposited) {
        self.balance += event.0;
    }
}

struct Deposit(u64);

impl Handle<Deposit> for Account {
    fn handle(&self, command: &Deposit) -> Result<Vec<Deposited>, DomainError> {
        Ok(vec![Deposited(command.0)])
    }
}

#[tokio::test]
async fn two_commits_at_the_same_version_have_one_winner() {
    // Given: two writers that loaded the same empty stream
    let store = InMemoryEventStore::new();
    let repository = AggregateRepository::new(store.clone());
    let first = repository.load::<Account>(&"a").await.unwrap();
    let second = repository.load::<Account>(&"a").await.unwrap();

    // When: both commit on top of what they loaded
    let (r1, r2) = tokio::join!(
        repository.commit::<Account>(&"a", first.expected_version(), vec![Deposited(1)], None),
        repository.commit::<Account>(&"a", second.expected_version(), vec![Deposited(2)], None),
    );

    // Then: exactly one commit lands and the loser sees a conflict
    assert!(r1.is_ok() ^ r2.is_ok());
    let loser = if r1.is_ok() { r2 } else { r1 };
    assert!(loser.unwrap_err().is_version_conflict());
    assert_eq!(store.read_stream(&first.stream_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn committing_an_empty_batch_is_refused() {
    let repository = AggregateRepository::new(InMemoryEventStore::<Deposited>::new());
    let result = repository
        .commit::<Account>(&"a", ExpectedVersion::New, vec![], None)
        .await;
    assert!(result.is_err());
}

/// Yields after every read so that concurrent commands interleave their
/// load and commit steps.
#[derive(Clone)]
struct Yielding(InMemoryEventStore<Deposited>);

#[async_trait]
impl EventStore for Yielding {
    type Event = Deposited;

    async fn read_stream(&self, stream_id: &StreamId) -> EventStoreResult<StreamData<Deposited>> {
        let data = self.0.read_stream(stream_id).await;
        tokio::task::yield_now().await;
        data
    }

    async fn append(&self, stream_events: StreamEvents<Deposited>) -> EventStoreResult<EventVersion> {
        self.0.append(stream_events).await
    }

    async fn stream_version(&self, stream_id: &StreamId) -> EventStoreResult<Option<EventVersion>> {
        self.0.stream_version(stream_id).await
    }
}

#[tokio::test]
async fn racing_commands_never_lose_or_duplicate_deposits() {
    let store = InMemoryEventStore::new();
    let executor = CommandExecutor::new(Yielding(store.clone())).with_retry_config(RetryConfig {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
    });
    let context = ExecutionContext::default();

    let commands: Vec<_> = (1..=12u64).map(Deposit).collect();
    let outcomes = join_all(
        commands
            .iter()
            .map(|command| executor.execute::<Account, _>(&"shared", command, &context)),
    )
    .await
    .into_iter()
    .collect::<Result<Vec<_>, _>>()
    .unwrap();

    let accepted: u64 = outcomes
        .iter()
        .flat_map(CommandOutcome::events)
        .map(|(_, event)| event.0)
        .sum();
    let exhausted = outcomes
        .iter()
        .filter(|o| matches!(o, CommandOutcome::ConcurrencyExhausted { .. }))
        .count();
    let loaded = executor
        .repository()
        .load::<Account>(&"shared")
        .await
        .unwrap();

    assert!(exhausted > 0, "the interleaving should force at least one loser");
    assert_eq!(loaded.state.balance, accepted);
    assert_eq!(
        store.read_stream(&loaded.stream_id).await.unwrap().len(),
        outcomes.iter().filter(|o| !o.events().is_empty()).count()
    );
}
