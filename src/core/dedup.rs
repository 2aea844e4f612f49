use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::num::NonZeroUsize;

use crate::types::AnnouncementKey;

enum Backing {
    Unbounded(HashSet<AnnouncementKey>),
    /// Least-recently-seen keys are evicted once `capacity` is reached
    Bounded(LruCache<AnnouncementKey, ()>),
}

/// Set of `(destination, transfer id)` pairs that have already been announced
pub struct DedupTracker {
    keys: Mutex<Backing>,
}

impl Default for DedupTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupTracker {
    /// Unbounded tracker: a key, once recorded, stays for the process lifetime
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(Backing::Unbounded(HashSet::new())),
        }
    }

    /// Bounded tracker with least-recently-seen eviction
    pub fn bounded(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            keys: Mutex::new(Backing::Bounded(LruCache::new(cap))),
        }
    }

    /// Returns `true` and records the key if it was not seen before
    pub fn is_new(&self, destination: &str, transfer_id: &str) -> bool {
        self.mark_announced(destination, transfer_id)
    }

    /// Read-only check; refreshes recency in bounded mode
    pub fn is_announced(&self, destination: &str, transfer_id: &str) -> bool {
        let key = AnnouncementKey::new(destination, transfer_id);
        match &mut *self.keys.lock() {
            Backing::Unbounded(set) => set.contains(&key),
            Backing::Bounded(cache) => cache.get(&key).is_some(),
        }
    }

    /// Insert-if-absent; `true` when the key was newly recorded
    pub fn mark_announced(&self, destination: &str, transfer_id: &str) -> bool {
        let key = AnnouncementKey::new(destination, transfer_id);
        match &mut *self.keys.lock() {
            Backing::Unbounded(set) => set.insert(key),
            Backing::Bounded(cache) => {
                if cache.get(&key).is_some() {
                    false
                } else {
                    cache.put(key, ());
                    true
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        match &*self.keys.lock() {
            Backing::Unbounded(set) => set.len(),
            Backing::Bounded(cache) => cache.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of recorded keys for one destination
    pub fn count_for(&self, destination: &str) -> usize {
        match &*self.keys.lock() {
            Backing::Unbounded(set) => set.iter().filter(|k| k.destination == destination).count(),
            Backing::Bounded(cache) => cache.iter().filter(|(k, _)| k.destination == destination).count(),
        }
    }
}
