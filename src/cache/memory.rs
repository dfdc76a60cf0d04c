//! Bounded in-memory cache tier.
//!
//! A capacity-bounded map from normalized text to vector with
//! least-recently-used eviction. Volatile by design — the durable tier in
//! [`super::durable`] carries entries across restarts.

use std::collections::HashMap;

/// One in-memory entry. `last_used` is a monotonic tick, not wall time.
struct Slot {
    vector: Vec<f32>,
    created_at: String,
    last_used: u64,
}

/// LRU map bounded by entry count.
pub struct MemoryTier {
    slots: HashMap<String, Slot>,
    capacity: usize,
    tick: u64,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: HashMap::new(),
            capacity: capacity.max(1),
            tick: 0,
        }
    }

    /// Look up a vector, marking the entry as most recently used.
    pub fn get(&mut self, key: &str) -> Option<Vec<f32>> {
        self.tick += 1;
        let tick = self.tick;
        self.slots.get_mut(key).map(|slot| {
            slot.last_used = tick;
            slot.vector.clone()
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Insert an entry, evicting the least recently used one if at capacity.
    pub fn insert(&mut self, key: String, vector: Vec<f32>, created_at: String) {
        self.tick += 1;

        if !self.slots.contains_key(&key) && self.slots.len() >= self.capacity {
            if let Some(oldest) = self
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone())
            {
                self.slots.remove(&oldest);
            }
        }

        self.slots.insert(
            key,
            Slot {
                vector,
                created_at,
                last_used: self.tick,
            },
        );
    }

    pub fn remove(&mut self, key: &str) {
        self.slots.remove(key);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Rough heap footprint: key bytes plus 4 bytes per vector element.
    pub fn bytes_estimate(&self) -> u64 {
        self.slots
            .iter()
            .map(|(k, slot)| (k.len() + slot.vector.len() * std::mem::size_of::<f32>()) as u64)
            .sum()
    }

    /// Oldest and newest `created_at` timestamps among resident entries.
    pub fn time_range(&self) -> (Option<String>, Option<String>) {
        let oldest = self.slots.values().map(|s| s.created_at.as_str()).min();
        let newest = self.slots.values().map(|s| s.created_at.as_str()).max();
        (oldest.map(String::from), newest.map(String::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    #[test]
    fn insert_and_get() {
        let mut tier = MemoryTier::new(10);
        tier.insert("hello".into(), vec![1.0, 2.0], now());
        assert_eq!(tier.get("hello"), Some(vec![1.0, 2.0]));
        assert_eq!(tier.get("missing"), None);
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut tier = MemoryTier::new(2);
        tier.insert("a".into(), vec![1.0], now());
        tier.insert("b".into(), vec![2.0], now());

        // Touch "a" so "b" becomes the LRU entry.
        tier.get("a");
        tier.insert("c".into(), vec![3.0], now());

        assert_eq!(tier.len(), 2);
        assert!(tier.contains("a"));
        assert!(tier.contains("c"));
        assert!(!tier.contains("b"));
    }

    #[test]
    fn reinsert_does_not_evict() {
        let mut tier = MemoryTier::new(2);
        tier.insert("a".into(), vec![1.0], now());
        tier.insert("b".into(), vec![2.0], now());
        tier.insert("a".into(), vec![9.0], now());

        assert_eq!(tier.len(), 2);
        assert_eq!(tier.get("a"), Some(vec![9.0]));
        assert!(tier.contains("b"));
    }

    #[test]
    fn clear_empties() {
        let mut tier = MemoryTier::new(4);
        tier.insert("a".into(), vec![1.0], now());
        tier.clear();
        assert!(tier.is_empty());
        assert_eq!(tier.bytes_estimate(), 0);
    }

    #[test]
    fn bytes_estimate_counts_key_and_vector() {
        let mut tier = MemoryTier::new(4);
        tier.insert("abcd".into(), vec![0.0; 10], now());
        assert_eq!(tier.bytes_estimate(), 4 + 40);
    }
}
