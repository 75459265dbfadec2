//! Bounded LRU cache with per-entry expiry.
//!
//! Capacity is fixed at construction; inserting into a full cache evicts the
//! least recently used entry. Expired entries are dropped when touched. Time is
//! passed in by the caller so the cache stays deterministic under simulation.

use std::{collections::HashMap, hash::Hash, time::Duration};

use crate::env::Timestamp;

struct Slot<V> {
    value: V,
    expires_at: Timestamp,
    last_used: u64,
}

/// LRU + TTL cache with an explicit capacity.
pub struct BoundedCache<K, V> {
    slots: HashMap<K, Slot<V>>,
    capacity: usize,
    ttl: Duration,
    clock: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedCache<K, V> {
    /// Cache holding at most `capacity` entries (minimum 1), each for `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self { slots: HashMap::with_capacity(capacity), capacity, ttl, clock: 0 }
    }

    /// Live value for `key`, refreshing its recency.
    pub fn get(&mut self, key: &K, now: Timestamp) -> Option<V> {
        self.clock += 1;
        let clock = self.clock;

        match self.slots.get_mut(key) {
            Some(slot) if slot.expires_at > now => {
                slot.last_used = clock;
                Some(slot.value.clone())
            },
            Some(_) => {
                self.slots.remove(key);
                None
            },
            None => None,
        }
    }

    /// Insert or replace `key`, evicting the least recently used entry if the
    /// cache is full.
    pub fn insert(&mut self, key: K, value: V, now: Timestamp) {
        self.clock += 1;

        if !self.slots.contains_key(&key) && self.slots.len() >= self.capacity {
            self.evict(now);
        }

        self.slots.insert(key, Slot {
            value,
            expires_at: now.saturating_add(self.ttl),
            last_used: self.clock,
        });
    }

    /// Drop `key`.
    pub fn invalidate(&mut self, key: &K) {
        self.slots.remove(key);
    }

    /// Entries currently held, including expired ones not yet touched.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no entries are held.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove expired entries, or the least recently used one if none expired.
    fn evict(&mut self, now: Timestamp) {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.expires_at > now);
        if self.slots.len() < before {
            return;
        }

        let oldest = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            self.slots.remove(&key);
        }
    }
}

impl<K, V> std::fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("len", &self.slots.len())
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn at(secs: u64) -> Timestamp {
        Timestamp::from_millis(secs * 1_000)
    }

    #[test]
    fn get_returns_inserted_value() {
        let mut cache = BoundedCache::new(2, TTL);
        cache.insert("a", 1, at(0));

        assert_eq!(cache.get(&"a", at(1)), Some(1));
        assert_eq!(cache.get(&"b", at(1)), None);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache = BoundedCache::new(2, TTL);
        cache.insert("a", 1, at(0));

        assert_eq!(cache.get(&"a", at(59)), Some(1));
        assert_eq!(cache.get(&"a", at(60)), None);
        assert!(cache.is_empty(), "expired entry is dropped on access");
    }

    #[test]
    fn full_cache_evicts_least_recently_used() {
        let mut cache = BoundedCache::new(2, TTL);
        cache.insert("a", 1, at(0));
        cache.insert("b", 2, at(0));

        // touch "a" so "b" becomes the eviction candidate
        cache.get(&"a", at(1));
        cache.insert("c", 3, at(2));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a", at(3)), Some(1));
        assert_eq!(cache.get(&"b", at(3)), None);
        assert_eq!(cache.get(&"c", at(3)), Some(3));
    }

    #[test]
    fn expired_entries_are_evicted_before_live_ones() {
        let mut cache = BoundedCache::new(2, TTL);
        cache.insert("old", 1, at(0));
        cache.insert("fresh", 2, at(50));

        cache.insert("new", 3, at(70));

        assert_eq!(cache.get(&"fresh", at(71)), Some(2));
        assert_eq!(cache.get(&"new", at(71)), Some(3));
    }

    #[test]
    fn replacing_key_does_not_evict() {
        let mut cache = BoundedCache::new(2, TTL);
        cache.insert("a", 1, at(0));
        cache.insert("b", 2, at(0));
        cache.insert("a", 10, at(1));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"b", at(2)), Some(2));
        assert_eq!(cache.get(&"a", at(2)), Some(10));
    }

    #[test]
    fn capacity_is_at_least_one() {
        let mut cache = BoundedCache::new(0, TTL);
        cache.insert("a", 1, at(0));
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
    }
}
