//! Bounded Cache - Per-related-type LRU store for resolved entities
//!
//! Strict least-recently-used eviction over a hash map plus an arena-backed
//! doubly linked recency list, so get, put, and evict are all O(1). Lookup
//! used for miss classification (`contains`, `peek`) deliberately does not
//! promote recency; only `get` and `put` do.

use std::collections::HashMap;
use tracing::warn;

use crate::key::Key;
use crate::record::Record;
use crate::source::{DataSourceError, EntitySource};

/// Cache effectiveness counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Promoting lookups that found an entry
    pub hits: u64,
    /// Promoting lookups that found nothing
    pub misses: u64,
    /// Entries dropped to stay within capacity
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of promoting lookups served from the cache
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct Slot<V> {
    key: Key,
    value: V,
    /// Towards the most recently used end
    prev: Option<usize>,
    /// Towards the least recently used end
    next: Option<usize>,
}

/// Bounded LRU store mapping keys to cached entities.
///
/// Capacity is a hard bound for normal inserts; [`warm`](BoundedCache::warm)
/// ignores it for eager specs whose tables are assumed small. Ties between
/// entries that were never re-accessed fall out as insertion order, since a
/// fresh insert starts at the most recently used end.
#[derive(Debug)]
pub struct BoundedCache<V> {
    capacity: usize,
    map: HashMap<Key, usize>,
    slots: Vec<Option<Slot<V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    stats: CacheStats,
}

impl<V> BoundedCache<V> {
    /// Create a cache bounded to `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            stats: CacheStats::default(),
        }
    }

    /// Look up an entry and promote it to most recently used
    pub fn get(&mut self, key: &Key) -> Option<&V> {
        match self.map.get(key).copied() {
            Some(index) => {
                self.stats.hits += 1;
                self.unlink(index);
                self.push_front(index);
                self.slots[index].as_ref().map(|slot| &slot.value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Look up an entry without touching recency or stats
    pub fn peek(&self, key: &Key) -> Option<&V> {
        self.map
            .get(key)
            .and_then(|&index| self.slots[index].as_ref())
            .map(|slot| &slot.value)
    }

    /// Whether an entry is cached, without touching recency or stats
    pub fn contains(&self, key: &Key) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or replace an entry, promoting it and evicting the least
    /// recently used entry if the insert pushed the cache over capacity
    pub fn put(&mut self, key: Key, value: V) {
        if let Some(&index) = self.map.get(&key) {
            if let Some(slot) = self.slots[index].as_mut() {
                slot.value = value;
            }
            self.unlink(index);
            self.push_front(index);
            return;
        }
        let index = self.insert_slot(key.clone(), value);
        self.map.insert(key, index);
        self.push_front(index);
        if self.map.len() > self.capacity {
            self.evict_lru();
        }
    }

    /// Bulk-load entries ignoring capacity
    pub fn warm(&mut self, entries: impl IntoIterator<Item = (Key, V)>) {
        for (key, value) in entries {
            if let Some(&index) = self.map.get(&key) {
                if let Some(slot) = self.slots[index].as_mut() {
                    slot.value = value;
                }
                continue;
            }
            let index = self.insert_slot(key.clone(), value);
            self.map.insert(key, index);
            self.push_front(index);
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The configured capacity bound
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Effectiveness counters accumulated so far
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn insert_slot(&mut self, key: Key, value: V) -> usize {
        let slot = Slot {
            key,
            value,
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        }
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = match self.slots[index].as_ref() {
            Some(slot) => (slot.prev, slot.next),
            None => return,
        };
        match prev {
            Some(p) => {
                if let Some(slot) = self.slots[p].as_mut() {
                    slot.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(slot) = self.slots[n].as_mut() {
                    slot.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        if let Some(slot) = self.slots[index].as_mut() {
            slot.prev = None;
            slot.next = None;
        }
    }

    fn push_front(&mut self, index: usize) {
        let old_head = self.head;
        if let Some(slot) = self.slots[index].as_mut() {
            slot.prev = None;
            slot.next = old_head;
        }
        if let Some(old) = old_head {
            if let Some(slot) = self.slots[old].as_mut() {
                slot.prev = Some(index);
            }
        }
        self.head = Some(index);
        if self.tail.is_none() {
            self.tail = Some(index);
        }
    }

    fn evict_lru(&mut self) {
        let Some(index) = self.tail else { return };
        self.unlink(index);
        if let Some(slot) = self.slots[index].take() {
            self.map.remove(&slot.key);
            self.free.push(index);
            self.stats.evictions += 1;
        }
    }
}

impl<R: Record> BoundedCache<R> {
    /// Load every entity from the source, ignoring capacity. Used for specs
    /// marked eager, whose tables are assumed small enough to hold whole.
    pub fn warm_all(
        &mut self,
        source: &dyn EntitySource<R>,
    ) -> Result<usize, DataSourceError> {
        let entities = source.read_all()?;
        self.warm(entities.into_iter().filter_map(|entity| {
            match entity.identity() {
                Some(id) => Some((id, entity)),
                None => {
                    warn!("warm-up entity without an identity; skipping");
                    None
                }
            }
        }));
        Ok(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(capacity: usize, keys: &[i64]) -> BoundedCache<String> {
        let mut cache = BoundedCache::new(capacity);
        for &k in keys {
            cache.put(Key::Integer(k), format!("v{}", k));
        }
        cache
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let cache = cache_with(3, &[1, 2, 3, 4, 5]);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn test_evicts_least_recently_used_first() {
        let mut cache = cache_with(2, &[1, 2]);

        // touch 1 so 2 becomes the eviction candidate
        assert!(cache.get(&Key::Integer(1)).is_some());
        cache.put(Key::Integer(3), "v3".into());

        assert!(cache.contains(&Key::Integer(1)));
        assert!(!cache.contains(&Key::Integer(2)));
        assert!(cache.contains(&Key::Integer(3)));
    }

    #[test]
    fn test_untouched_entries_evict_in_insertion_order() {
        let mut cache = cache_with(3, &[1, 2, 3]);
        cache.put(Key::Integer(4), "v4".into());
        cache.put(Key::Integer(5), "v5".into());

        assert!(!cache.contains(&Key::Integer(1)));
        assert!(!cache.contains(&Key::Integer(2)));
        assert!(cache.contains(&Key::Integer(3)));
    }

    #[test]
    fn test_put_existing_replaces_and_promotes() {
        let mut cache = cache_with(2, &[1, 2]);
        cache.put(Key::Integer(1), "v1-new".into());
        cache.put(Key::Integer(3), "v3".into());

        // 2 was least recently used once 1 got re-put
        assert!(!cache.contains(&Key::Integer(2)));
        assert_eq!(cache.get(&Key::Integer(1)).map(String::as_str), Some("v1-new"));
    }

    #[test]
    fn test_peek_and_contains_do_not_promote() {
        let mut cache = cache_with(2, &[1, 2]);
        assert!(cache.peek(&Key::Integer(1)).is_some());
        assert!(cache.contains(&Key::Integer(1)));
        cache.put(Key::Integer(3), "v3".into());

        // 1 was still least recently used despite peek/contains
        assert!(!cache.contains(&Key::Integer(1)));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_warm_ignores_capacity() {
        let mut cache: BoundedCache<String> = BoundedCache::new(2);
        cache.warm((1..=10).map(|k| (Key::Integer(k), format!("v{}", k))));
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_warm_all_loads_every_entity() {
        use crate::source::MemorySource;
        use serde_json::json;

        let source = MemorySource::new([json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);
        let mut cache: BoundedCache<serde_json::Value> = BoundedCache::new(2);

        let count = cache.warm_all(&source).unwrap();
        assert_eq!(count, 3);
        assert!(cache.contains(&Key::Integer(2)));
        assert_eq!(source.read_all_count(), 1);
    }

    #[test]
    fn test_hit_ratio() {
        let mut cache = cache_with(2, &[1]);
        cache.get(&Key::Integer(1));
        cache.get(&Key::Integer(9));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
        assert!((cache.stats().hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_slot_reuse_after_eviction() {
        let mut cache = cache_with(1, &[1, 2, 3]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&Key::Integer(3)).map(String::as_str), Some("v3"));
        // the arena should not grow past capacity + 1
        assert!(cache.slots.len() <= 2);
    }
}
