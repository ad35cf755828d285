use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Hit/miss counters and current size for one named cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
}

impl CacheStats {
    pub fn empty() -> Self {
        Self {
            hits: 0,
            misses: 0,
            hit_rate: 0.0,
            size: 0,
        }
    }
}

struct CacheSlot<V> {
    value: V,
    last_access: AtomicU64,
}

/// A bounded, instrumented key-value store.
///
/// Lookups and inserts are lock-free reads/sharded writes via `DashMap`;
/// when the store exceeds its capacity the least-recently-used entry is
/// evicted. Two callers racing on the same miss may both compute and both
/// write, which is benign: values are deterministic per key, last write
/// wins.
pub struct BoundedCache<K, V> {
    name: &'static str,
    map: DashMap<K, CacheSlot<V>>,
    capacity: usize,
    tick: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            map: DashMap::new(),
            capacity: capacity.max(1),
            tick: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the cached value for `key`, or computes, stores, and
    /// returns it.
    pub fn get_or_compute(&self, key: K, compute: impl FnOnce() -> V) -> V {
        let now = self.tick.fetch_add(1, Ordering::Relaxed) + 1;

        if let Some(slot) = self.map.get(&key) {
            slot.last_access.store(now, Ordering::Relaxed);
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!("cache hit: {}", self.name);
            return slot.value.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!("cache miss: {}", self.name);
        let value = compute();
        self.insert_slot(key, value.clone(), now);
        value
    }

    /// Fallible variant of [`get_or_compute`](Self::get_or_compute).
    /// Failures are returned to the caller and never cached.
    pub fn try_get_or_compute<E>(
        &self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        let now = self.tick.fetch_add(1, Ordering::Relaxed) + 1;

        if let Some(slot) = self.map.get(&key) {
            slot.last_access.store(now, Ordering::Relaxed);
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!("cache hit: {}", self.name);
            return Ok(slot.value.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!("cache miss: {}", self.name);
        let value = compute()?;
        self.insert_slot(key, value.clone(), now);
        Ok(value)
    }

    fn insert_slot(&self, key: K, value: V, now: u64) {
        self.map.insert(
            key,
            CacheSlot {
                value,
                last_access: AtomicU64::new(now),
            },
        );
        while self.map.len() > self.capacity {
            if !self.evict_oldest() {
                break;
            }
        }
    }

    /// Removes the least-recently-accessed entry. Returns false when the
    /// cache is already empty.
    fn evict_oldest(&self) -> bool {
        let mut oldest_key: Option<K> = None;
        let mut oldest_tick = u64::MAX;
        for entry in self.map.iter() {
            let access = entry.value().last_access.load(Ordering::Relaxed);
            if access < oldest_tick {
                oldest_tick = access;
                oldest_key = Some(entry.key().clone());
            }
        }
        match oldest_key {
            Some(key) => {
                self.map.remove(&key);
                trace!("cache eviction: {}", self.name);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, key: &K) {
        self.map.remove(key);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Empties the cache and zeroes the hit/miss counters.
    pub fn clear(&self) {
        self.map.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            size: self.map.len(),
        }
    }
}

/// Size-bounded usage counter for frequently seen terms or contents.
///
/// Unlike [`BoundedCache`] this stores nothing but counts, so the stats
/// report exposes only its size.
pub struct FrequencyCache {
    map: DashMap<String, u64>,
    capacity: usize,
}

impl FrequencyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Bumps the usage count for `key`. New keys are dropped once the
    /// counter table is full; existing keys keep counting.
    pub fn record(&self, key: &str) {
        if let Some(mut count) = self.map.get_mut(key) {
            *count += 1;
            return;
        }
        if self.map.len() < self.capacity {
            self.map.insert(key.to_string(), 1);
        }
    }

    pub fn count(&self, key: &str) -> u64 {
        self.map.get(key).map(|c| *c).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_miss_accounting() {
        let cache: BoundedCache<String, usize> = BoundedCache::new("test", 8);

        let v = cache.get_or_compute("a".to_string(), || 1);
        assert_eq!(v, 1);
        let v = cache.get_or_compute("a".to_string(), || 2);
        assert_eq!(v, 1, "second lookup must reuse the cached value");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_rate_zero_with_no_accesses() {
        let cache: BoundedCache<String, usize> = BoundedCache::new("test", 8);
        assert_eq!(cache.stats().hit_rate, 0.0);
    }

    #[test]
    fn test_lru_eviction() {
        let cache: BoundedCache<u32, u32> = BoundedCache::new("test", 2);
        cache.get_or_compute(1, || 10);
        cache.get_or_compute(2, || 20);
        // Touch key 1 so key 2 becomes the oldest
        cache.get_or_compute(1, || 99);
        cache.get_or_compute(3, || 30);

        assert_eq!(cache.len(), 2);
        let stats_before = cache.stats();
        cache.get_or_compute(1, || 99);
        assert_eq!(
            cache.stats().hits,
            stats_before.hits + 1,
            "recently used key must survive eviction"
        );
    }

    #[test]
    fn test_clear_zeroes_counters() {
        let cache: BoundedCache<u32, u32> = BoundedCache::new("test", 4);
        cache.get_or_compute(1, || 10);
        cache.get_or_compute(1, || 10);
        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.size, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn test_try_get_or_compute_does_not_cache_errors() {
        let cache: BoundedCache<u32, u32> = BoundedCache::new("test", 4);
        let result: Result<u32, &str> = cache.try_get_or_compute(1, || Err("boom"));
        assert!(result.is_err());
        assert_eq!(cache.len(), 0);

        let result: Result<u32, &str> = cache.try_get_or_compute(1, || Ok(7));
        assert_eq!(result, Ok(7));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_frequency_cache_counts() {
        let freq = FrequencyCache::new(2);
        freq.record("alpha");
        freq.record("alpha");
        freq.record("beta");
        freq.record("gamma"); // table full, dropped
        assert_eq!(freq.count("alpha"), 2);
        assert_eq!(freq.count("beta"), 1);
        assert_eq!(freq.count("gamma"), 0);
        assert_eq!(freq.len(), 2);

        freq.clear();
        assert!(freq.is_empty());
    }
}
