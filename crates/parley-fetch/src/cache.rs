use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;

use crate::FetchError;

/// Default entry count when no explicit capacity is given.
const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(v) => v,
    None => unreachable!(),
};

/// Fixed-capacity byte cache with least-recently-used eviction.
///
/// Keys are opaque resource locators. Inserting into a full cache evicts
/// the least-recently-used entry; a hit on [`BoundedCache::get`] refreshes
/// the entry's recency. Construct with an explicit capacity for isolated
/// use (tests), or take [`Default`] at the composition root.
pub struct BoundedCache {
    store: Mutex<LruCache<String, Bytes>>,
}

impl BoundedCache {
    /// Errors with [`FetchError::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, FetchError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(FetchError::InvalidCapacity)?;
        Ok(Self {
            store: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.store.lock().get(key).cloned()
    }

    pub fn put(&self, key: impl Into<String>, value: Bytes) {
        self.store.lock().put(key.into(), value);
    }

    pub fn remove(&self, key: &str) {
        self.store.lock().pop(key);
    }

    pub fn clear(&self) {
        self.store.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.store.lock().cap().get()
    }
}

impl Default for BoundedCache {
    fn default() -> Self {
        Self {
            store: Mutex::new(LruCache::new(DEFAULT_CAPACITY)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn zero_capacity_is_an_error() {
        assert!(matches!(
            BoundedCache::new(0),
            Err(FetchError::InvalidCapacity)
        ));
    }

    #[test]
    fn default_capacity_is_one_hundred() {
        let cache = BoundedCache::default();
        assert_eq!(cache.capacity(), 100);
        assert!(cache.is_empty());
    }

    #[test]
    fn overflow_evicts_least_recently_used() {
        let cache = BoundedCache::new(2).unwrap();
        cache.put("a", bytes("1"));
        cache.put("b", bytes("2"));
        cache.put("c", bytes("3"));

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(bytes("2")));
        assert_eq!(cache.get("c"), Some(bytes("3")));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn get_refreshes_recency() {
        let cache = BoundedCache::new(2).unwrap();
        cache.put("a", bytes("1"));
        cache.put("b", bytes("2"));

        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.put("c", bytes("3"));

        assert_eq!(cache.get("a"), Some(bytes("1")));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(bytes("3")));
    }

    #[test]
    fn put_replaces_existing_value() {
        let cache = BoundedCache::new(2).unwrap();
        cache.put("a", bytes("1"));
        cache.put("a", bytes("updated"));

        assert_eq!(cache.get("a"), Some(bytes("updated")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_and_clear() {
        let cache = BoundedCache::new(4).unwrap();
        cache.put("a", bytes("1"));
        cache.put("b", bytes("2"));

        cache.remove("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("b"), None);
    }
}
