//! Time-to-live cache with single-flight fetches.

use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use crate::errors::GatewayError;
use crate::utils::clock::{Clock, SystemClock};

type FlightResult<V> = Result<(V, DateTime<Utc>), GatewayError>;
type Flight<V> = Shared<BoxFuture<'static, FlightResult<V>>>;

/// A value returned from the cache along with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<V> {
    pub value: V,
    pub fetched_at: DateTime<Utc>,
    pub from_cache: bool,
    /// Older than its TTL; only produced by `get_or_stale` and `peek`.
    pub stale: bool,
}

struct Entry<V> {
    value: V,
    fetched_at: DateTime<Utc>,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

struct Slot<V> {
    entry: Option<Entry<V>>,
    inflight: Option<(u64, Flight<V>)>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            entry: None,
            inflight: None,
        }
    }
}

/// Memoizes fetch results per key for a TTL.
///
/// Concurrent callers for the same key share one in-flight fetch and all see
/// its result or its error. A fetch only stores its result if its slot was
/// not invalidated while it ran, so a read that raced a write cannot put the
/// pre-write value back.
///
/// The fetch closure is invoked while the key's shard is locked; it must only
/// build the future and never touch this cache synchronously.
pub struct TtlCache<K, V> {
    slots: Arc<DashMap<K, Slot<V>>>,
    next_flight: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            next_flight: AtomicU64::new(1),
            clock,
        }
    }

    /// Returns the cached value if fresh, otherwise runs `fetch` once and
    /// stores its result. `force` skips the freshness check.
    ///
    /// A failed fetch leaves any previous value stored but returns the error.
    pub async fn get<F, Fut>(&self, key: K, ttl: Duration, force: bool, fetch: F) -> Result<V, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, GatewayError>> + Send + 'static,
    {
        self.fetch(key, ttl, force, fetch).await.map(|f| f.value)
    }

    /// Like [`get`](Self::get) but reports whether the value was served from cache.
    pub async fn fetch<F, Fut>(
        &self,
        key: K,
        ttl: Duration,
        force: bool,
        fetch: F,
    ) -> Result<Fetched<V>, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, GatewayError>> + Send + 'static,
    {
        let flight = {
            let mut slot = self.slots.entry(key.clone()).or_default();
            if !force {
                if let Some(entry) = slot.entry.as_ref().filter(|e| e.is_fresh()) {
                    return Ok(Fetched {
                        value: entry.value.clone(),
                        fetched_at: entry.fetched_at,
                        from_cache: true,
                        stale: false,
                    });
                }
            }
            match &slot.inflight {
                Some((_, flight)) => flight.clone(),
                None => {
                    let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let flight = self.start_flight(key, id, ttl, fetch());
                    slot.inflight = Some((id, flight.clone()));
                    flight
                }
            }
        };

        let (value, fetched_at) = flight.await?;
        Ok(Fetched {
            value,
            fetched_at,
            from_cache: false,
            stale: false,
        })
    }

    /// Stale-on-error variant: when the fetch fails and an older value is
    /// stored, returns it flagged `stale`.
    pub async fn get_or_stale<F, Fut>(
        &self,
        key: K,
        ttl: Duration,
        force: bool,
        fetch: F,
    ) -> Result<Fetched<V>, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, GatewayError>> + Send + 'static,
    {
        match self.fetch(key.clone(), ttl, force, fetch).await {
            Ok(fetched) => Ok(fetched),
            Err(err) => match self.peek(&key) {
                Some(mut fetched) => {
                    log::warn!("Serving stale cache entry after fetch failure: {}", err);
                    fetched.stale = true;
                    Ok(fetched)
                }
                None => Err(err),
            },
        }
    }

    /// The stored value regardless of age, without fetching.
    pub fn peek(&self, key: &K) -> Option<Fetched<V>> {
        let slot = self.slots.get(key)?;
        let entry = slot.entry.as_ref()?;
        Some(Fetched {
            value: entry.value.clone(),
            fetched_at: entry.fetched_at,
            from_cache: true,
            stale: !entry.is_fresh(),
        })
    }

    /// Drops the stored value and detaches any in-flight fetch for `key`.
    pub fn invalidate(&self, key: &K) {
        self.slots.remove(key);
    }

    pub fn invalidate_where(&self, mut predicate: impl FnMut(&K) -> bool) {
        self.slots.retain(|k, _| !predicate(k));
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn start_flight<Fut>(&self, key: K, id: u64, ttl: Duration, fut: Fut) -> Flight<V>
    where
        Fut: Future<Output = Result<V, GatewayError>> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        let clock = Arc::clone(&self.clock);
        async move {
            let result = fut.await;
            let fetched_at = clock.now();
            if let Some(mut slot) = slots.get_mut(&key) {
                if slot.inflight.as_ref().map(|(flight_id, _)| *flight_id) == Some(id) {
                    slot.inflight = None;
                    if let Ok(value) = &result {
                        slot.entry = Some(Entry {
                            value: value.clone(),
                            fetched_at,
                            stored_at: Instant::now(),
                            ttl,
                        });
                    }
                }
            }
            result.map(|value| (value, fetched_at))
        }
        .boxed()
        .shared()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const TTL: Duration = Duration::from_secs(300);

    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        value: i64,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<i64, GatewayError>> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_does_not_refetch() {
        let cache: TtlCache<&'static str, i64> = TtlCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cache.get("balance", TTL, false, counting_fetch(&calls, 1)).await.unwrap(), 1);
        let second = cache.fetch("balance", TTL, false, counting_fetch(&calls, 2)).await.unwrap();
        assert_eq!(second.value, 1);
        assert!(second.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_and_force_refetch() {
        let cache: TtlCache<&'static str, i64> = TtlCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("k", TTL, false, counting_fetch(&calls, 1)).await.unwrap();
        assert_eq!(cache.get("k", TTL, true, counting_fetch(&calls, 2)).await.unwrap(), 2);

        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        assert_eq!(cache.get("k", TTL, false, counting_fetch(&calls, 3)).await.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_gets_share_one_fetch() {
        let cache: Arc<TtlCache<&'static str, i64>> = Arc::new(TtlCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            let fetch = counting_fetch(&calls, i);
            handles.push(tokio::spawn(async move { cache.get("k", TTL, false, fetch).await }));
        }
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|v| *v == results[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_stale_value_but_get_errors() {
        let cache: TtlCache<&'static str, i64> = TtlCache::new();
        cache.get("k", TTL, false, || async { Ok::<_, GatewayError>(7) }).await.unwrap();

        let err = cache
            .get("k", TTL, true, || async { Err::<i64, _>(GatewayError::timeout("bank")) })
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::timeout("bank"));
        assert_eq!(cache.peek(&"k").map(|f| f.value), Some(7));

        let stale = cache
            .get_or_stale("k", TTL, true, || async { Err::<i64, _>(GatewayError::timeout("bank")) })
            .await
            .unwrap();
        assert_eq!(stale.value, 7);
        assert!(stale.stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_detaches_inflight_fetch() {
        let cache: Arc<TtlCache<&'static str, i64>> = Arc::new(TtlCache::new());

        let racing = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get("k", TTL, false, || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, GatewayError>(1)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.invalidate(&"k");

        assert_eq!(racing.await.unwrap().unwrap(), 1);
        assert!(cache.peek(&"k").is_none());
        assert_eq!(cache.get("k", TTL, false, || async { Ok::<_, GatewayError>(2) }).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_clear_and_len() {
        let cache: TtlCache<u32, i64> = TtlCache::new();
        cache.get(1, TTL, false, || async { Ok::<_, GatewayError>(1) }).await.unwrap();
        cache.get(2, TTL, false, || async { Ok::<_, GatewayError>(2) }).await.unwrap();
        assert_eq!(cache.len(), 2);
        cache.invalidate_where(|k| *k == 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
