use casecore::{
    DomainEvent, EventId, EventStore, EventStoreError, EventToWrite, ExpectedVersion,
    StreamEvents, StreamId,
};
use casecore_memory::InMemoryEventStore;
use casecore_testing::{ChaosConfig, ChaosEventStoreExt};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Ping(u32);

impl DomainEvent for Ping {
    fn event_type(&self) -> &'static str {
        "Ping"
    }
}

fn stream() -> StreamId {
    StreamId::try_new("chaos-stream").expect("valid stream id")
}

fn ping(expected: ExpectedVersion, n: u32) -> StreamEvents<Ping> {
    StreamEvents::new(
        stream(),
        expected,
        vec![EventToWrite::new(EventId::new(), Ping(n))],
    )
}

#[tokio::test]
async fn zero_probability_passthrough_allows_normal_operations() {
    let store = InMemoryEventStore::new().with_chaos(ChaosConfig::deterministic());

    let version = store.append(ping(ExpectedVersion::New, 1)).await.unwrap();
    let data = store.read_stream(&stream()).await.unwrap();

    assert_eq!(data.version, Some(version));
    assert_eq!(data.events[0].payload, Ping(1));
    assert_eq!(store.injected_faults(), 0);
}

#[tokio::test]
async fn scripted_conflicts_then_success() {
    let store = InMemoryEventStore::new()
        .with_chaos(ChaosConfig::deterministic().with_conflicts_before_success(2));

    for _ in 0..2 {
        let err = store.append(ping(ExpectedVersion::New, 1)).await.unwrap_err();
        assert!(err.is_version_conflict());
    }
    store.append(ping(ExpectedVersion::New, 1)).await.unwrap();

    assert_eq!(store.append_calls(), 3);
    assert_eq!(store.injected_faults(), 2);
    assert_eq!(store.inner().read_stream(&stream()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn full_failure_probability_never_reaches_inner_store() {
    let store = InMemoryEventStore::new()
        .with_chaos(ChaosConfig::deterministic().with_failure_probability(1.0));

    assert!(matches!(
        store.append(ping(ExpectedVersion::New, 1)).await,
        Err(EventStoreError::Unavailable(_))
    ));
    assert!(matches!(
        store.read_stream(&stream()).await,
        Err(EventStoreError::Unavailable(_))
    ));
    assert!(store.inner().read_stream(&stream()).await.unwrap().is_empty());
}

#[tokio::test]
async fn seeded_injection_is_reproducible() {
    async fn outcomes(seed: u64) -> Vec<bool> {
        let store = InMemoryEventStore::new().with_chaos(
            ChaosConfig::default()
                .with_seed(seed)
                .with_version_conflict_probability(0.5),
        );
        let mut seen = Vec::new();
        for n in 0..16 {
            seen.push(store.append(ping(ExpectedVersion::Any, n)).await.is_ok());
        }
        seen
    }

    assert_eq!(outcomes(7).await, outcomes(7).await);
}
