use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long a cached result stays fresh before a read refetches it.
pub const STALE_AFTER: Duration = Duration::from_secs(30);

/// Background refresh cadence for the standing queries.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

struct Entry<V> {
    value: V,
    fetched_at: Instant,
}

/// A cache keyed by logical query identity, with a stale window.
///
/// Entries are invalidated explicitly after successful mutations and by
/// age on read; there is no server push. A superseded refresh simply
/// overwrites the entry.
pub struct QueryCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    stale_after: Duration,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stale_after,
        }
    }

    /// A still-fresh cached value, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.lock();
        entries.get(key).and_then(|entry| {
            if entry.fetched_at.elapsed() < self.stale_after {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    pub fn put(&self, key: &str, value: V) {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Return the fresh cached value or run `fetch` and cache its result.
    /// Fetch errors are propagated without touching the cached entry.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            debug!("Cache hit for {}", key);
            return Ok(value);
        }
        debug!("Cache miss for {}; fetching", key);
        let value = fetch().await?;
        self.put(key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_entries_are_served_from_cache() {
        let cache: QueryCache<u64> = QueryCache::new(Duration::from_secs(60));
        let mut calls = 0u32;

        for _ in 0..3 {
            let value = cache
                .get_or_fetch("key", || {
                    calls += 1;
                    async { Ok::<_, ()>(7) }
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn stale_entries_are_refetched() {
        let cache: QueryCache<u64> = QueryCache::new(Duration::ZERO);
        cache.put("key", 1);
        assert_eq!(cache.get("key"), None);

        let value = cache
            .get_or_fetch("key", || async { Ok::<_, ()>(2) })
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn invalidation_forces_a_refetch() {
        let cache: QueryCache<u64> = QueryCache::new(Duration::from_secs(60));
        cache.put("key", 1);
        assert_eq!(cache.get("key"), Some(1));

        cache.invalidate("key");
        assert_eq!(cache.get("key"), None);

        let value = cache
            .get_or_fetch("key", || async { Ok::<_, ()>(2) })
            .await
            .unwrap();
        assert_eq!(value, 2);
        assert_eq!(cache.get("key"), Some(2));
    }

    #[tokio::test]
    async fn fetch_errors_do_not_poison_the_cache() {
        let cache: QueryCache<u64> = QueryCache::new(Duration::from_secs(60));
        let result = cache
            .get_or_fetch("key", || async { Err::<u64, &str>("boom") })
            .await;
        assert_eq!(result, Err("boom"));
        assert_eq!(cache.get("key"), None);

        // A later successful fetch lands normally.
        let value = cache
            .get_or_fetch("key", || async { Ok::<_, &str>(3) })
            .await
            .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn keys_are_independent() {
        let cache: QueryCache<u64> = QueryCache::new(Duration::from_secs(60));
        cache.put("a", 1);
        cache.put("b", 2);
        cache.invalidate("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
    }
}
