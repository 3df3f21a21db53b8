//! Cache facade.
//!
//! `TagCache::cached` wraps a producer with memoization, a TTL and tags. It is
//! the only path that creates or replaces entries.

use std::any::type_name;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tracing::{debug, error, warn};

use super::config::CacheConfig;
use super::entry::{CacheEntry, CachedValue};
use super::error::CacheError;
use super::flight::SingleFlight;
use super::index::{EpochSnapshot, TagIndex};
use super::keys::{CacheKey, Tag, derive_key};
use super::store::{Admission, EntryStore, Lookup};
use super::ttl::{Clock, Expiry, SystemClock};

pub(crate) const METRIC_CACHE_HIT: &str = "corkboard_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "corkboard_cache_miss_total";
pub(crate) const METRIC_CACHE_EXPIRED: &str = "corkboard_cache_expired_total";
pub(crate) const METRIC_CACHE_COALESCED: &str = "corkboard_cache_coalesced_total";
pub(crate) const METRIC_CACHE_PRODUCER_ERROR: &str = "corkboard_cache_producer_error_total";
pub(crate) const METRIC_CACHE_DISCARDED: &str = "corkboard_cache_discarded_total";
pub(crate) const METRIC_CACHE_INVALIDATED: &str = "corkboard_cache_invalidated_total";
pub(crate) const METRIC_CACHE_SWEPT: &str = "corkboard_cache_swept_total";
pub(crate) const METRIC_CACHE_ENTRIES: &str = "corkboard_cache_entries";
pub(crate) const METRIC_CACHE_PRODUCER_MS: &str = "corkboard_cache_producer_ms";

/// How a call site wants its result cached.
#[derive(Debug, Clone, Default)]
pub struct CachePolicy {
    /// Time before a forced recompute. Zero disables caching for the call.
    pub ttl: Duration,
    /// Data domains the result depends on.
    pub tags: Vec<Tag>,
    /// Upper bound on the producer call; falls back to the configured default.
    pub timeout: Option<Duration>,
}

impl CachePolicy {
    pub fn new(ttl: Duration, tags: impl IntoIterator<Item = Tag>) -> Self {
        Self {
            ttl,
            tags: tags.into_iter().collect(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// In-process memoization of derived queries with TTL expiry and tag-based
/// group invalidation.
///
/// Constructed once at startup and shared through an `Arc`; tests build
/// isolated instances, optionally with a [`ManualClock`](super::ManualClock).
pub struct TagCache {
    pub(super) config: CacheConfig,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) store: EntryStore,
    pub(super) index: TagIndex,
    flights: SingleFlight,
    next_entry_id: AtomicU64,
}

impl TagCache {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    pub fn with_clock(config: CacheConfig, clock: impl Clock) -> Self {
        Self {
            config,
            clock: Arc::new(clock),
            store: EntryStore::new(),
            index: TagIndex::new(),
            flights: SingleFlight::new(),
            next_entry_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of stored entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Number of tags with at least one registered entry.
    pub fn tag_count(&self) -> usize {
        self.index.tag_count()
    }

    /// Number of entries registered under `tag`.
    pub fn entries_tagged(&self, tag: &Tag) -> usize {
        self.index.key_count(tag)
    }

    /// Return the memoized result of `operation(args)`, running `producer` on
    /// a miss or after expiry.
    pub async fn cached<A, V, E, F, Fut>(
        &self,
        operation: &str,
        args: &A,
        ttl: Duration,
        tags: &[Tag],
        producer: F,
    ) -> Result<Arc<V>, E>
    where
        A: Serialize + ?Sized,
        V: Send + Sync + 'static,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let policy = CachePolicy::new(ttl, tags.iter().cloned());
        self.cached_with(operation, args, &policy, producer).await
    }

    /// Like [`cached`](Self::cached) for lookups that may find nothing. A
    /// `None` result is kept for `missing_ttl` rather than `ttl`, so lookups
    /// of unknown identifiers do not pin entries for a full detail TTL.
    pub async fn cached_optional<A, V, E, F, Fut>(
        &self,
        operation: &str,
        args: &A,
        ttl: Duration,
        missing_ttl: Duration,
        tags: &[Tag],
        producer: F,
    ) -> Result<Arc<Option<V>>, E>
    where
        A: Serialize + ?Sized,
        V: Send + Sync + 'static,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
    {
        let policy = CachePolicy::new(ttl, tags.iter().cloned());
        let ttl_of = |value: &Option<V>| match value {
            Some(_) => ttl,
            None => missing_ttl,
        };
        self.memoize(operation, args, &policy, ttl_of, producer).await
    }

    /// Like [`cached`](Self::cached), with a full [`CachePolicy`].
    ///
    /// Producer errors are returned unchanged and never stored, so the next
    /// call retries. Cache-side failures (key derivation, producer timeout)
    /// reach the caller through `E: From<CacheError>`.
    pub async fn cached_with<A, V, E, F, Fut>(
        &self,
        operation: &str,
        args: &A,
        policy: &CachePolicy,
        producer: F,
    ) -> Result<Arc<V>, E>
    where
        A: Serialize + ?Sized,
        V: Send + Sync + 'static,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.memoize(operation, args, policy, |_: &V| policy.ttl, producer)
            .await
    }

    async fn memoize<A, V, E, T, F, Fut>(
        &self,
        operation: &str,
        args: &A,
        policy: &CachePolicy,
        ttl_of: T,
        producer: F,
    ) -> Result<Arc<V>, E>
    where
        A: Serialize + ?Sized,
        V: Send + Sync + 'static,
        E: From<CacheError>,
        T: FnOnce(&V) -> Duration,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let key = match derive_key(operation, args) {
            Ok(key) => key,
            Err(err) => {
                error!(operation, error = %err, "Cache key derivation failed");
                return Err(E::from(CacheError::from(err)));
            }
        };
        let timeout = policy.timeout.or(self.config.producer_timeout);

        if !self.config.enabled {
            return self
                .produce(operation, timeout, producer)
                .await
                .map(Arc::new);
        }

        if let Some(value) = self.lookup::<V>(&key) {
            counter!(METRIC_CACHE_HIT, "operation" => operation.to_owned()).increment(1);
            return Ok(value);
        }

        let _flight = if self.config.single_flight {
            let guard = self.flights.acquire(&key).await;
            if let Some(value) = self.lookup::<V>(&key) {
                counter!(METRIC_CACHE_COALESCED, "operation" => operation.to_owned())
                    .increment(1);
                return Ok(value);
            }
            Some(guard)
        } else {
            None
        };

        counter!(METRIC_CACHE_MISS, "operation" => operation.to_owned()).increment(1);
        let epochs = self.index.snapshot(&policy.tags);
        let value = Arc::new(self.produce(operation, timeout, producer).await?);
        let ttl = ttl_of(&*value);
        self.admit(&key, Arc::clone(&value) as CachedValue, ttl, &policy.tags, &epochs);
        Ok(value)
    }

    fn lookup<V>(&self, key: &CacheKey) -> Option<Arc<V>>
    where
        V: Send + Sync + 'static,
    {
        match self.store.get(key, self.clock.now(), &self.index) {
            Lookup::Hit(value) => match value.downcast::<V>() {
                Ok(value) => {
                    debug!(key = %key, "Cache hit");
                    Some(value)
                }
                Err(_) => {
                    warn!(
                        key = %key,
                        expected = type_name::<V>(),
                        "Cached value has an unexpected type; recomputing"
                    );
                    None
                }
            },
            Lookup::Expired => {
                counter!(METRIC_CACHE_EXPIRED, "operation" => key.operation().to_owned())
                    .increment(1);
                debug!(key = %key, "Cache entry expired");
                self.record_entries();
                None
            }
            Lookup::Miss => None,
        }
    }

    async fn produce<V, E, F, Fut>(
        &self,
        operation: &str,
        timeout: Option<Duration>,
        producer: F,
    ) -> Result<V, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let started_at = Instant::now();
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, producer()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    counter!(METRIC_CACHE_PRODUCER_ERROR, "operation" => operation.to_owned())
                        .increment(1);
                    warn!(
                        operation,
                        timeout_ms = limit.as_millis() as u64,
                        "Cache producer timed out"
                    );
                    return Err(E::from(CacheError::ProducerTimeout {
                        operation: operation.to_string(),
                        timeout: limit,
                    }));
                }
            },
            None => producer().await,
        };

        histogram!(METRIC_CACHE_PRODUCER_MS, "operation" => operation.to_owned())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        if outcome.is_err() {
            counter!(METRIC_CACHE_PRODUCER_ERROR, "operation" => operation.to_owned())
                .increment(1);
            debug!(operation, "Cache producer failed; nothing stored");
        }

        outcome
    }

    /// Store a freshly produced value unless one of its tags was invalidated
    /// while the producer ran.
    fn admit(
        &self,
        key: &CacheKey,
        value: CachedValue,
        ttl: Duration,
        tags: &[Tag],
        epochs: &EpochSnapshot,
    ) {
        if ttl.is_zero() {
            debug!(key = %key, "Zero TTL; result not stored");
            return;
        }

        let now = self.clock.now();
        let id = self.next_entry_id.fetch_add(1, Ordering::Relaxed);
        let entry = CacheEntry {
            id,
            key: key.clone(),
            value,
            created_at: now,
            expires_at: Expiry::after(now, ttl),
            tags: tags.iter().cloned().collect(),
        };
        match self.store.put(entry, &self.index, epochs) {
            Admission::Stored(_) => debug!(
                key = %key,
                entry_id = id,
                ttl_ms = ttl.as_millis() as u64,
                tags = ?tags,
                "Cache entry stored"
            ),
            Admission::Stale => {
                counter!(METRIC_CACHE_DISCARDED, "operation" => key.operation().to_owned())
                    .increment(1);
                debug!(key = %key, "Tags invalidated during recomputation; result not retained");
            }
        }

        self.record_entries();
    }

    pub(super) fn record_entries(&self) {
        gauge!(METRIC_CACHE_ENTRIES).set(self.store.len() as f64);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::cache::ttl::ManualClock;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("backing store unavailable")]
        Unavailable,
        #[error(transparent)]
        Cache(#[from] CacheError),
    }

    fn events() -> Tag {
        Tag::from_static("events")
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let cache = TagCache::new(CacheConfig::default());
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Arc<Vec<&str>> = cache
                .cached("events.upcoming", &(10,), Duration::from_secs(60), &[events()], || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(vec!["spring-meetup"])
                })
                .await
                .expect("value");
            assert_eq!(value.as_slice(), ["spring-meetup"]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.entries_tagged(&events()), 1);
    }

    #[tokio::test]
    async fn different_arguments_are_cached_separately() {
        let cache = TagCache::new(CacheConfig::default());
        let calls = AtomicUsize::new(0);

        for limit in [5_u32, 10, 5] {
            cache
                .cached("events.upcoming", &(limit,), Duration::from_secs(60), &[events()], || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(limit)
                })
                .await
                .expect("value");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entry_is_recomputed() {
        let clock = Arc::new(ManualClock::new());
        let cache = TagCache::with_clock(CacheConfig::default(), Arc::clone(&clock));
        let calls = AtomicUsize::new(0);
        let fetch = || async {
            Ok::<_, TestError>(calls.fetch_add(1, Ordering::SeqCst))
        };

        let first = cache
            .cached("dashboard.stats", &(), Duration::from_secs(300), &[], fetch)
            .await
            .expect("value");
        clock.advance(Duration::from_secs(300));
        let second = cache
            .cached("dashboard.stats", &(), Duration::from_secs(300), &[], fetch)
            .await
            .expect("value");

        assert_eq!((*first, *second), (0, 1));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = TagCache::new(CacheConfig::default());
        let calls = AtomicUsize::new(0);

        let failed: Result<Arc<u32>, TestError> = cache
            .cached("jobs.open", &(), Duration::from_secs(60), &[], || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Unavailable)
            })
            .await;
        assert!(matches!(failed, Err(TestError::Unavailable)));
        assert!(cache.is_empty());

        let value = cache
            .cached("jobs.open", &(), Duration::from_secs(60), &[], || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(3_u32)
            })
            .await
            .expect("retry succeeds");
        assert_eq!(*value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_ttl_skips_storage() {
        let cache = TagCache::new(CacheConfig::default());
        cache
            .cached("posts.recent", &(5,), Duration::ZERO, &[], || async {
                Ok::<_, TestError>(1_u8)
            })
            .await
            .expect("value");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn disabled_cache_always_produces() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let cache = TagCache::new(config);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            cache
                .cached("posts.recent", &(5,), Duration::from_secs(60), &[], || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(())
                })
                .await
                .expect("value");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn missing_results_use_the_shorter_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = TagCache::with_clock(CacheConfig::default(), Arc::clone(&clock));
        let hour = Duration::from_secs(3600);
        let minute = Duration::from_secs(60);
        let lookups = AtomicUsize::new(0);
        let find = |slug: &'static str| {
            let lookups = &lookups;
            move || async move {
                lookups.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>((slug == "rustconf").then_some(slug))
            }
        };

        for slug in ["rustconf", "no-such-event"] {
            cache
                .cached_optional(
                    "events.by_slug",
                    &(slug,),
                    hour,
                    minute,
                    &[events()],
                    find(slug),
                )
                .await
                .expect("value");
        }
        clock.advance(minute);
        for slug in ["rustconf", "no-such-event"] {
            cache
                .cached_optional(
                    "events.by_slug",
                    &(slug,),
                    hour,
                    minute,
                    &[events()],
                    find(slug),
                )
                .await
                .expect("value");
        }

        // Only the unknown slug was looked up again.
        assert_eq!(lookups.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_missing_ttl_keeps_misses_out_of_the_store() {
        let cache = TagCache::new(CacheConfig::default());

        let found: Arc<Option<u8>> = cache
            .cached_optional(
                "jobs.by_slug",
                &("sre",),
                Duration::from_secs(60),
                Duration::ZERO,
                &[],
                || async { Ok::<_, TestError>(None) },
            )
            .await
            .expect("value");

        assert!(found.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn producer_timeout_is_reported_and_not_cached() {
        let cache = TagCache::new(CacheConfig::default());
        let policy = CachePolicy::new(Duration::from_secs(60), [events()])
            .with_timeout(Duration::from_millis(10));

        let result: Result<Arc<u8>, TestError> = cache
            .cached_with("events.upcoming", &(10,), &policy, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            })
            .await;

        assert!(matches!(
            result,
            Err(TestError::Cache(CacheError::ProducerTimeout { ref operation, .. }))
                if operation == "events.upcoming"
        ));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn unserializable_arguments_surface_as_cache_errors() {
        let cache = TagCache::new(CacheConfig::default());
        let args = std::collections::BTreeMap::from([(vec![1_u8], 1_u8)]);

        let result: Result<Arc<u8>, TestError> = cache
            .cached("bad.args", &args, Duration::from_secs(60), &[], || async { Ok(1) })
            .await;

        assert!(matches!(
            result,
            Err(TestError::Cache(CacheError::KeyDerivation(_)))
        ));
    }

    #[tokio::test]
    async fn type_mismatch_is_treated_as_a_miss() {
        let cache = TagCache::new(CacheConfig::default());
        cache
            .cached("shared.op", &(), Duration::from_secs(60), &[], || async {
                Ok::<_, TestError>(1_u32)
            })
            .await
            .expect("value");

        let text = cache
            .cached("shared.op", &(), Duration::from_secs(60), &[], || async {
                Ok::<_, TestError>("one".to_string())
            })
            .await
            .expect("value");

        assert_eq!(text.as_str(), "one");
        assert_eq!(cache.len(), 1);
    }
}
