//! Insertion-ordered key → element store with FIFO eviction.
//!
//! Used by the key zipper to hold secondary elements that have been pulled
//! but not yet matched. Entries live in a `HashMap` tagged with a monotonic
//! sequence number; a `VecDeque` records insertion order. Popping by key
//! leaves a stale entry in the queue, which [`MatchBuffer::evict_oldest`]
//! skips lazily, so every operation is amortized O(1).

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

#[derive(Debug)]
pub struct MatchBuffer<K, V> {
    entries: HashMap<K, (u64, V)>,
    order: VecDeque<(u64, K)>,
    next_seq: u64,
}

impl<K, V> Default for MatchBuffer<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            next_seq: 0,
        }
    }
}

impl<K: Hash + Eq + Clone, V> MatchBuffer<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a new entry as the newest. Hands the entry back if the key is
    /// already present; the buffer is left untouched in that case.
    pub fn insert(&mut self, key: K, value: V) -> Result<(), (K, V)> {
        if self.entries.contains_key(&key) {
            return Err((key, value));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.push_back((seq, key.clone()));
        self.entries.insert(key, (seq, value));
        Ok(())
    }

    /// Remove and return the entry stored under `key`.
    pub fn pop(&mut self, key: &K) -> Option<V> {
        let (_, v) = self.entries.remove(key)?;
        // Keep the order queue from growing without bound when most entries
        // are popped by key rather than evicted.
        if self.order.len() > 2 * self.entries.len() + 16 {
            let entries = &self.entries;
            self.order
                .retain(|(seq, k)| entries.get(k).is_some_and(|(s, _)| s == seq));
        }
        Some(v)
    }

    /// Remove and return the oldest still-present entry.
    pub fn evict_oldest(&mut self) -> Option<(K, V)> {
        while let Some((seq, key)) = self.order.pop_front() {
            let live = self.entries.get(&key).is_some_and(|(s, _)| *s == seq);
            if live {
                let (_, v) = self.entries.remove(&key)?;
                return Some((key, v));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_in_insertion_order() {
        let mut b = MatchBuffer::new();
        for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
            assert!(b.insert(k, v).is_ok());
        }
        assert_eq!(b.evict_oldest(), Some(("a", 1)));
        assert_eq!(b.evict_oldest(), Some(("b", 2)));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn popped_keys_are_skipped_on_eviction() {
        let mut b = MatchBuffer::new();
        b.insert(1, "x").unwrap();
        b.insert(2, "y").unwrap();
        b.insert(3, "z").unwrap();
        assert_eq!(b.pop(&1), Some("x"));
        assert_eq!(b.evict_oldest(), Some((2, "y")));
        assert!(b.contains(&3));
        assert!(!b.contains(&2));
    }

    #[test]
    fn reinserting_a_popped_key_is_newest() {
        let mut b = MatchBuffer::new();
        b.insert("k", 1).unwrap();
        b.insert("j", 2).unwrap();
        b.pop(&"k");
        b.insert("k", 3).unwrap();
        assert_eq!(b.evict_oldest(), Some(("j", 2)));
        assert_eq!(b.evict_oldest(), Some(("k", 3)));
        assert!(b.is_empty());
        assert_eq!(b.evict_oldest(), None);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut b = MatchBuffer::new();
        b.insert("k", 1).unwrap();
        assert_eq!(b.insert("k", 2), Err(("k", 2)));
        assert_eq!(b.pop(&"k"), Some(1));
    }

    #[test]
    fn order_queue_is_compacted() {
        let mut b = MatchBuffer::new();
        for i in 0..1000 {
            b.insert(i, i).unwrap();
            b.pop(&i);
        }
        assert!(b.order.len() <= 16);
    }
}
