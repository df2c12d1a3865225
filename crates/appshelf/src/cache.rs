//! Bounded attribute caches with LRU eviction.
//!
//! An [`AttributeCache`] maps item keys to resolved attribute values. It is
//! safe to share between resolver threads and the presentation sink: every
//! operation takes a single internal lock for a short, non-blocking critical
//! section.
//!
//! The cache has a hard capacity. Each `put` that grows the cache past its
//! capacity evicts the least recently used entries, so memory stays bounded
//! no matter how many items pass through it.
//!
//! # Example
//!
//! ```
//! use appshelf::cache::AttributeCache;
//!
//! let cache = AttributeCache::new("names", 2);
//! cache.put("a.app".to_string(), "Alpha".to_string());
//! cache.put("b.app".to_string(), "Beta".to_string());
//!
//! // Touch "a.app" so "b.app" becomes least recently used.
//! assert_eq!(cache.get("a.app").as_deref(), Some("Alpha"));
//!
//! cache.put("c.app".to_string(), "Gamma".to_string());
//! assert!(!cache.contains("b.app"));
//! assert!(cache.contains("a.app"));
//! ```

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use parking_lot::Mutex;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Number of `get` calls that found a value.
    pub hits: u64,
    /// Number of `get` calls that found nothing.
    pub misses: u64,
    /// Number of entries dropped to respect the capacity.
    pub evictions: u64,
    /// Current number of entries.
    pub len: usize,
    /// Maximum number of entries.
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, from 0.0 to 1.0.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry<V> {
    value: V,
    stamp: u64,
}

/// Lock-protected cache contents.
///
/// `order` indexes keys by their last access stamp; its first entry is the
/// least recently used key.
struct LruState<K, V> {
    entries: HashMap<K, Entry<V>>,
    order: BTreeMap<u64, K>,
    next_stamp: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Eq + Hash + Clone, V> LruState<K, V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_stamp: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn stamp(&mut self) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        stamp
    }

    fn touch<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let stamp = self.stamp();
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        let old = std::mem::replace(&mut entry.stamp, stamp);
        if let Some(owned) = self.order.remove(&old) {
            self.order.insert(stamp, owned);
        }
        true
    }

    fn evict_lru(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        self.evictions += 1;
        Some(key)
    }
}

/// A thread-safe key → value cache with a hard capacity and LRU eviction.
pub struct AttributeCache<K, V> {
    name: &'static str,
    capacity: usize,
    state: Mutex<LruState<K, V>>,
}

impl<K, V> AttributeCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            state: Mutex::new(LruState::new()),
        }
    }

    /// The name used for this cache in log output.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up a value and mark it most recently used.
    ///
    /// Never blocks on, or triggers, resolution.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.lock();
        if state.touch(key) {
            state.hits += 1;
            state.entries.get(key).map(|entry| entry.value.clone())
        } else {
            state.misses += 1;
            None
        }
    }

    /// Look up a value without affecting recency or statistics.
    ///
    /// Used for bulk scans such as re-filtering, which would otherwise
    /// promote every entry they visit.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state
            .lock()
            .entries
            .get(key)
            .map(|entry| entry.value.clone())
    }

    /// Check whether a key is present, without affecting recency.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state.lock().entries.contains_key(key)
    }

    /// Store a value, mark it most recently used and evict least recently
    /// used entries while the cache is over capacity.
    ///
    /// Returns the evicted keys.
    pub fn put(&self, key: K, value: V) -> Vec<K> {
        let mut state = self.state.lock();
        let stamp = state.stamp();

        if let Some(entry) = state.entries.get_mut(&key) {
            let old = std::mem::replace(&mut entry.stamp, stamp);
            entry.value = value;
            state.order.remove(&old);
            state.order.insert(stamp, key);
            return Vec::new();
        }

        state.entries.insert(key.clone(), Entry { value, stamp });
        state.order.insert(stamp, key);

        let mut evicted = Vec::new();
        while state.entries.len() > self.capacity {
            match state.evict_lru() {
                Some(key) => evicted.push(key),
                None => break,
            }
        }

        if !evicted.is_empty() {
            tracing::trace!(target: "appshelf::cache", cache = self.name, evicted = evicted.len(), "evicted least recently used entries");
        }
        evicted
    }

    /// Remove a single entry.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.lock();
        let entry = state.entries.remove(key)?;
        state.order.remove(&entry.stamp);
        Some(entry.value)
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let dropped = state.entries.len();
        state.entries.clear();
        state.order.clear();
        tracing::debug!(target: "appshelf::cache", cache = self.name, dropped, "cache cleared");
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.state.lock().order.values().cloned().collect()
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            len: state.entries.len(),
            capacity: self.capacity,
        }
    }
}

impl<K, V> std::fmt::Debug for AttributeCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AttributeCache")
            .field("name", &self.name)
            .field("len", &state.entries.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cache(capacity: usize) -> AttributeCache<String, u32> {
        AttributeCache::new("test", capacity)
    }

    #[test]
    fn test_get_miss_and_hit() {
        let cache = cache(4);
        assert_eq!(cache.get("a"), None);

        cache.put("a".into(), 1);
        assert_eq!(cache.get("a"), Some(1));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_put_beyond_capacity_evicts_lru() {
        let cache = cache(3);
        cache.put("a".into(), 1);
        cache.put("b".into(), 2);
        cache.put("c".into(), 3);

        let evicted = cache.put("d".into(), 4);
        assert_eq!(evicted, vec!["a".to_string()]);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache = cache(2);
        cache.put("a".into(), 1);
        cache.put("b".into(), 2);
        cache.get("a");

        cache.put("c".into(), 3);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert_eq!(cache.keys_by_recency(), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_peek_and_contains_do_not_refresh_recency() {
        let cache = cache(2);
        cache.put("a".into(), 1);
        cache.put("b".into(), 2);
        assert_eq!(cache.peek("a"), Some(1));
        assert!(cache.contains("a"));

        cache.put("c".into(), 3);
        assert!(!cache.contains("a"));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_overwrite_keeps_size_and_refreshes() {
        let cache = cache(2);
        cache.put("a".into(), 1);
        cache.put("b".into(), 2);
        assert!(cache.put("a".into(), 10).is_empty());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek("a"), Some(10));
        assert_eq!(cache.keys_by_recency(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_clear_and_remove() {
        let cache = cache(4);
        cache.put("a".into(), 1);
        cache.put("b".into(), 2);

        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.remove("a"), None);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.keys_by_recency().is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let cache = cache(0);
        cache.put("a".into(), 1);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_puts_stay_bounded() {
        let cache = Arc::new(cache(16));
        let threads: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        cache.put(format!("{t}-{i}"), i);
                        cache.get(&format!("{t}-{}", i / 2));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(cache.len(), 16);
        assert_eq!(cache.keys_by_recency().len(), 16);
    }
}
