use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// A fixed-capacity, recency-ordered map with a disposal hook.
///
/// `set` inserts or refreshes recency; when the capacity is exceeded the
/// single least-recently-used entry is evicted, with the disposal hook
/// invoked on it first. The engine uses the hook to cancel in-flight
/// requests, so it must be safe to invoke on entries in any state —
/// cancelling an already-finished request is a no-op.
pub struct BoundedCache<K: Hash + Eq, V> {
    inner: LruCache<K, V>,
    on_evict: Box<dyn Fn(&K, &mut V) + Send + Sync>,
}

impl<K: Hash + Eq, V> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. A nonpositive bound is a configuration
    /// bug, not a runtime condition to recover from.
    pub fn new<F>(capacity: usize, on_evict: F) -> Self
    where
        F: Fn(&K, &mut V) + Send + Sync + 'static,
    {
        let capacity = NonZeroUsize::new(capacity).expect("cache capacity must be positive");
        Self {
            inner: LruCache::new(capacity),
            on_evict: Box::new(on_evict),
        }
    }

    /// Insert or replace an entry, refreshing its recency.
    ///
    /// A displaced entry — the evicted LRU entry, or the previous value of
    /// the same key — goes through the disposal hook before being dropped.
    pub fn set(&mut self, key: K, value: V) {
        if let Some((evicted_key, mut evicted)) = self.inner.push(key, value) {
            (self.on_evict)(&evicted_key, &mut evicted);
        }
    }

    /// Remove and dispose an entry unconditionally. Returns whether it existed.
    pub fn delete(&mut self, key: &K) -> bool {
        match self.inner.pop_entry(key) {
            Some((k, mut v)) => {
                (self.on_evict)(&k, &mut v);
                true
            }
            None => false,
        }
    }

    /// Look up an entry, refreshing its recency.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Iterate live entries, most recently used first. Does not touch recency.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Remove and dispose every entry.
    pub fn clear(&mut self) {
        while let Some((k, mut v)) = self.inner.pop_lru() {
            (self.on_evict)(&k, &mut v);
        }
    }
}
