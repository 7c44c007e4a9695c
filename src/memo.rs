//! Epoch-tagged memo tables.
//!
//! Every entry records the epoch it was computed under; a lookup under a different epoch is a
//! miss, and the stale entry is dropped on the spot. Bumping the epoch therefore invalidates
//! every table at once without walking them.
//!
//! Memory: unbounded tables grow as O(distinct keys queried). With a capacity, the least
//! recently used entry is evicted on insert once the table is full.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    epoch: u64,
    last_used: u64,
}

#[derive(Debug, Clone)]
pub struct EpochMemo<K, V> {
    slots: HashMap<K, Slot<V>>,
    /// access tick -> key, oldest first; only maintained when bounded
    recency: BTreeMap<u64, K>,
    capacity: Option<usize>,
    tick: u64,
}

impl<K: Hash + Eq + Clone, V: Clone> Default for EpochMemo<K, V> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<K: Hash + Eq + Clone, V: Clone> EpochMemo<K, V> {
    /// `capacity = None` means unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            slots: HashMap::new(),
            recency: BTreeMap::new(),
            capacity,
            tick: 0,
        }
    }

    pub fn get(&mut self, key: &K, epoch: u64) -> Option<V> {
        let stale = match self.slots.get(key) {
            None => return None,
            Some(slot) => slot.epoch != epoch,
        };
        if stale {
            self.remove(key);
            return None;
        }
        self.tick += 1;
        let tick = self.tick;
        let slot = self.slots.get_mut(key)?;
        if self.capacity.is_some() {
            self.recency.remove(&slot.last_used);
            self.recency.insert(tick, key.clone());
        }
        slot.last_used = tick;
        Some(slot.value.clone())
    }

    pub fn insert(&mut self, key: K, value: V, epoch: u64) {
        self.remove(&key);
        if let Some(cap) = self.capacity {
            while self.slots.len() >= cap.max(1) {
                let Some((_, oldest)) = self.recency.pop_first() else {
                    break;
                };
                self.slots.remove(&oldest);
            }
        }
        self.tick += 1;
        if self.capacity.is_some() {
            self.recency.insert(self.tick, key.clone());
        }
        self.slots.insert(
            key,
            Slot {
                value,
                epoch,
                last_used: self.tick,
            },
        );
    }

    /// Lookup, or compute-and-store on a miss.
    pub fn get_or_insert_with<F>(&mut self, key: K, epoch: u64, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(v) = self.get(&key, epoch) {
            return v;
        }
        let v = compute();
        self.insert(key, v.clone(), epoch);
        v
    }

    fn remove(&mut self, key: &K) {
        if let Some(slot) = self.slots.remove(key) {
            if self.capacity.is_some() {
                self.recency.remove(&slot.last_used);
            }
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.recency.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
