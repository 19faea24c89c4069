//! Bounded in-memory tile tier with least-recently-used eviction.

use std::collections::HashMap;
use std::sync::Arc;

use super::key::TileKey;
use super::pixels::TileImage;

struct Entry {
    tile: Arc<TileImage>,
    /// Last access, from the tier's monotonic clock
    stamp: u64,
}

pub(crate) struct MemoryTier {
    capacity: usize,
    clock: u64,
    entries: HashMap<TileKey, Entry>,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            clock: 0,
            entries: HashMap::new(),
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Look up `key` and mark it as most recently used.
    pub fn get(&mut self, key: &TileKey) -> Option<Arc<TileImage>> {
        let stamp = self.tick();
        let entry = self.entries.get_mut(key)?;
        entry.stamp = stamp;
        Some(Arc::clone(&entry.tile))
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Store `tile`, evicting the least recently used entry if the tier is
    /// full. Returns the evicted key.
    pub fn insert(&mut self, key: TileKey, tile: Arc<TileImage>) -> Option<TileKey> {
        let stamp = self.tick();
        let mut evicted = None;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            evicted = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.stamp)
                .map(|(k, _)| *k);
            if let Some(old) = &evicted {
                self.entries.remove(old);
            }
        }
        self.entries.insert(key, Entry { tile, stamp });
        evicted
    }

    pub fn remove(&mut self, key: &TileKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::key::TileProvider;

    fn key(x: u32) -> TileKey {
        TileKey::new(TileProvider::OpenStreetMap, 16, x, 0)
    }

    fn tile() -> Arc<TileImage> {
        Arc::new(TileImage {
            width: 1,
            height: 1,
            rgba: vec![0, 0, 0, 255],
        })
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut tier = MemoryTier::new(3);
        for x in 0..3 {
            assert_eq!(tier.insert(key(x), tile()), None);
        }
        assert!(tier.get(&key(0)).is_some());

        assert_eq!(tier.insert(key(3), tile()), Some(key(1)));
        assert_eq!(tier.len(), 3);
        assert!(tier.contains(&key(0)));
        assert!(!tier.contains(&key(1)));
    }

    #[test]
    fn reinsert_does_not_evict() {
        let mut tier = MemoryTier::new(2);
        tier.insert(key(0), tile());
        tier.insert(key(1), tile());
        assert_eq!(tier.insert(key(0), tile()), None);
        assert_eq!(tier.len(), 2);
        // key(0) was refreshed, so key(1) goes next
        assert_eq!(tier.insert(key(2), tile()), Some(key(1)));
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut tier = MemoryTier::new(0);
        tier.insert(key(0), tile());
        assert_eq!(tier.insert(key(1), tile()), Some(key(0)));
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn miss_does_not_insert() {
        let mut tier = MemoryTier::new(2);
        assert!(tier.get(&key(5)).is_none());
        assert_eq!(tier.len(), 0);
        assert!(!tier.remove(&key(5)));
    }
}
