//! Keyed caches with single-flight computation
//!
//! Reads are lock-free (DashMap). On a miss, callers of the same key queue on a
//! per-key lock so only one of them computes the value; the others observe the
//! stored result once the lock is released. Entries are never evicted.

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::elm::CompiledLibrary;
use crate::identifier::VersionedIdentifier;

/// Compiled libraries by exact identifier.
pub type LibraryCache = SingleFlightCache<VersionedIdentifier, Arc<CompiledLibrary>>;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct SingleFlightCache<K, V> {
    values: DashMap<K, V>,
    in_flight: DashMap<K, Arc<Mutex<()>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            in_flight: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.values.contains_key(key)
    }

    /// Store a value, replacing any previous entry.
    pub fn insert(&self, key: K, value: V) {
        self.values.insert(key, value);
    }

    /// Return the cached value if `is_fresh` accepts it, otherwise compute and
    /// store a replacement.
    ///
    /// Concurrent callers for one key run `compute` at most once between them
    /// as long as it succeeds; a failed computation stores nothing and the next
    /// waiter tries again.
    pub async fn get_or_try_insert_with<P, F, Fut, E>(
        &self,
        key: &K,
        is_fresh: P,
        compute: F,
    ) -> Result<V, E>
    where
        P: Fn(&V) -> bool,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.fresh(key, &is_fresh) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        let lock = self.in_flight.entry(key.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            // Another caller may have filled the entry while we waited
            match self.fresh(key, &is_fresh) {
                Some(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(value)
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    compute().await.inspect(|value| {
                        self.values.insert(key.clone(), value.clone());
                    })
                }
            }
        };

        // Drop the key lock once nobody else holds or waits on it
        drop(lock);
        self.in_flight
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn fresh(&self, key: &K, is_fresh: &impl Fn(&V) -> bool) -> Option<V> {
        self.values
            .get(key)
            .filter(|entry| is_fresh(entry.value()))
            .map(|entry| entry.value().clone())
    }

    pub fn keys(&self) -> Vec<K> {
        self.values.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&self) {
        self.values.clear();
        self.in_flight.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.values.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl<K, V> Default for SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_hit_skips_compute() {
        let cache: SingleFlightCache<String, u32> = SingleFlightCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with(&"answer".to_string(), |_| true, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats { size: 1, hits: 2, misses: 1 });
    }

    #[tokio::test]
    async fn test_stale_entry_is_replaced() {
        let cache: SingleFlightCache<&'static str, u32> = SingleFlightCache::new();
        cache.insert("k", 1);

        let value = cache
            .get_or_try_insert_with(&"k", |v| *v > 1, || async { Ok::<_, ()>(2) })
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(cache.get(&"k"), Some(2));
    }

    #[tokio::test]
    async fn test_failed_compute_stores_nothing() {
        let cache: SingleFlightCache<&'static str, u32> = SingleFlightCache::new();

        let result = cache
            .get_or_try_insert_with(&"k", |_| true, || async { Err::<u32, _>("boom") })
            .await;

        assert_eq!(result, Err("boom"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_key_locks_released_after_compute() {
        let cache: SingleFlightCache<u32, u32> = SingleFlightCache::new();

        for key in 0..1_000 {
            let result = cache
                .get_or_try_insert_with(&key, |_| true, || async { Err::<u32, _>("not found") })
                .await;
            assert!(result.is_err());
        }
        cache
            .get_or_try_insert_with(&5_000, |_| true, || async { Ok::<_, ()>(1) })
            .await
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.in_flight.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_compute_once() {
        let cache: Arc<SingleFlightCache<u32, u32>> = Arc::new(SingleFlightCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_try_insert_with(&7, |_| true, || async {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok::<_, ()>(49)
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok(49));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.in_flight.is_empty());
    }
}
