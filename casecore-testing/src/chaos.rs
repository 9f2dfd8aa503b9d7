//! Fault injection around any [`EventStore`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use casecore::errors::{EventStoreError, EventStoreResult};
use casecore::event_store::{EventStore, StreamData, StreamEvents};
use casecore::types::{EventVersion, StreamId};
use nutype::nutype;
use rand::{random, rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

/// Probability value for chaos engineering injection rates.
///
/// Probability represents a value in the range [0.0, 1.0] where 0.0 means
/// never inject failures and 1.0 means always inject failures.
///
/// # Examples
///
/// ```
/// use casecore_testing::chaos::Probability;
///
/// assert!(Probability::try_new(0.5).is_ok());
/// assert!(Probability::try_new(1.5).is_err());
/// assert!(Probability::try_new(-0.1).is_err());
/// ```
#[nutype(
    validate(greater_or_equal = 0.0, less_or_equal = 1.0),
    default = 0.0,
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Display, Into)
)]
pub struct Probability(f32);

impl Probability {
    /// Clamps `value` into [0.0, 1.0].
    pub fn clamped(value: f32) -> Self {
        Self::try_new(value.clamp(0.0, 1.0)).unwrap_or_default()
    }
}

/// What a [`ChaosEventStore`] injects, and how often.
#[derive(Debug, Clone, Default)]
pub struct ChaosConfig {
    deterministic_seed: Option<u64>,
    failure_probability: Probability,
    version_conflict_probability: Probability,
    conflicts_before_success: u32,
}

impl ChaosConfig {
    /// Seeded configuration: the same sequence of calls injects the same faults.
    pub fn deterministic() -> Self {
        Self {
            deterministic_seed: Some(0),
            ..Self::default()
        }
    }

    /// Seeds the injection RNG.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.deterministic_seed = Some(seed);
        self
    }

    /// Rate of `Unavailable` failures on reads and appends.
    #[must_use]
    pub fn with_failure_probability(mut self, probability: f32) -> Self {
        self.failure_probability = Probability::clamped(probability);
        self
    }

    /// Rate of injected version conflicts on appends.
    #[must_use]
    pub fn with_version_conflict_probability(mut self, probability: f32) -> Self {
        self.version_conflict_probability = Probability::clamped(probability);
        self
    }

    /// Fails the first `count` appends with a version conflict, then passes through.
    #[must_use]
    pub const fn with_conflicts_before_success(mut self, count: u32) -> Self {
        self.conflicts_before_success = count;
        self
    }
}

/// Wraps any store in a [`ChaosEventStore`].
pub trait ChaosEventStoreExt: Sized {
    /// Wraps `self` with the given fault configuration.
    fn with_chaos(self, config: ChaosConfig) -> ChaosEventStore<Self>;
}

/// Event store wrapper that injects version conflicts and outages.
///
/// Injected conflicts are reported before the inner store is touched, so the
/// wrapped store never sees a partial write.
#[derive(Debug)]
pub struct ChaosEventStore<S> {
    store: S,
    config: ChaosConfig,
    rng: Mutex<StdRng>,
    appends: AtomicU32,
    injected: AtomicU32,
}

impl<S> ChaosEventStore<S> {
    /// Wraps `store`.
    pub fn new(store: S, config: ChaosConfig) -> Self {
        let rng = match config.deterministic_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(random()),
        };

        Self {
            store,
            config,
            rng: Mutex::new(rng),
            appends: AtomicU32::new(0),
            injected: AtomicU32::new(0),
        }
    }

    /// The wrapped store.
    pub const fn inner(&self) -> &S {
        &self.store
    }

    /// Number of append calls received, faulted or not.
    pub fn append_calls(&self) -> u32 {
        self.appends.load(Ordering::SeqCst)
    }

    /// Number of faults injected so far.
    pub fn injected_faults(&self) -> u32 {
        self.injected.load(Ordering::SeqCst)
    }

    fn should_inject(&self, probability: Probability) -> bool {
        let prob_f32: f32 = probability.into();

        if prob_f32 <= 0.0 {
            return false;
        }

        if prob_f32 >= 1.0 {
            return true;
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random_bool(f64::from(prob_f32))
    }

    fn record_fault(&self) {
        self.injected.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S> EventStore for ChaosEventStore<S>
where
    S: EventStore,
{
    type Event = S::Event;

    async fn read_stream(&self, stream_id: &StreamId) -> EventStoreResult<StreamData<Self::Event>> {
        if self.should_inject(self.config.failure_probability) {
            self.record_fault();
            debug!(stream = %stream_id, "injecting read failure");
            return Err(EventStoreError::Unavailable(format!(
                "chaos: read of {stream_id} failed"
            )));
        }

        self.store.read_stream(stream_id).await
    }

    async fn append(
        &self,
        stream_events: StreamEvents<Self::Event>,
    ) -> EventStoreResult<EventVersion> {
        let call = self.appends.fetch_add(1, Ordering::SeqCst);
        let scripted_conflict = call < self.config.conflicts_before_success;
        let should_conflict =
            scripted_conflict || self.should_inject(self.config.version_conflict_probability);
        let should_fail = self.should_inject(self.config.failure_probability);

        if should_conflict {
            self.record_fault();
            let current = self.store.stream_version(&stream_events.stream_id).await?;
            debug!(stream = %stream_events.stream_id, "injecting version conflict");
            return Err(EventStoreError::version_conflict(
                stream_events.stream_id,
                stream_events.expected_version.as_option(),
                current,
            ));
        }

        if should_fail {
            self.record_fault();
            debug!(stream = %stream_events.stream_id, "injecting append failure");
            return Err(EventStoreError::Unavailable(format!(
                "chaos: append to {} failed",
                stream_events.stream_id
            )));
        }

        self.store.append(stream_events).await
    }

    async fn stream_version(&self, stream_id: &StreamId) -> EventStoreResult<Option<EventVersion>> {
        self.store.stream_version(stream_id).await
    }
}

impl<S> ChaosEventStoreExt for S
where
    S: EventStore,
{
    fn with_chaos(self, config: ChaosConfig) -> ChaosEventStore<Self> {
        ChaosEventStore::new(self, config)
    }
}
