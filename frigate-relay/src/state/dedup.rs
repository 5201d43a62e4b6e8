//! Bounded record of event ids that were already notified.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use tracing::debug;

/// Default capacity of [`DedupStore`].
pub const MAX_SIZE: usize = 50_000;

#[derive(Debug, Default)]
struct Inner {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

/// Identity-only dedup set with FIFO eviction.
///
/// `ids` and `order` always hold the same elements. Once the capacity is
/// exceeded the oldest inserted id is evicted and may be notified again.
#[derive(Debug)]
pub struct DedupStore {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for DedupStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SIZE)
    }

    /// A store holding at most `capacity` ids (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership test. Empty ids are never notified.
    pub fn was_notified(&self, id: &str) -> bool {
        !id.is_empty() && self.inner.lock().ids.contains(id)
    }

    /// Record `id`; no-op when already present or empty.
    pub fn mark_notified(&self, id: &str) {
        self.claim(id);
    }

    /// Check-and-mark in one critical section.
    ///
    /// Returns `true` only for the caller that inserted `id`, so concurrent
    /// deliveries of the same id let exactly one through.
    pub fn claim(&self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }

        let mut inner = self.inner.lock();
        if !inner.ids.insert(id.to_string()) {
            return false;
        }
        inner.order.push_back(id.to_string());

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.ids.remove(&oldest);
                debug!(event_id = %oldest, "Evicted oldest notified id");
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_mark_and_check() {
        let store = DedupStore::new();
        assert!(!store.was_notified("e1"));

        store.mark_notified("e1");
        store.mark_notified("e1");
        assert!(store.was_notified("e1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_empty_id_ignored() {
        let store = DedupStore::new();
        assert!(!store.claim(""));
        store.mark_notified("");
        assert!(!store.was_notified(""));
        assert!(store.is_empty());
    }

    #[test]
    fn test_claim_only_once() {
        let store = DedupStore::new();
        assert!(store.claim("e1"));
        assert!(!store.claim("e1"));
        assert!(store.claim("e2"));
    }

    #[test]
    fn test_fifo_eviction() {
        let store = DedupStore::with_capacity(3);
        for id in ["a", "b", "c", "d", "e"] {
            store.mark_notified(id);
        }

        assert_eq!(store.len(), 3);
        assert!(!store.was_notified("a"));
        assert!(!store.was_notified("b"));
        assert!(store.was_notified("c"));
        assert!(store.was_notified("e"));

        // Evicted ids are eligible again.
        assert!(store.claim("a"));
        assert!(!store.was_notified("c"));
    }

    #[test]
    fn test_rechecking_does_not_refresh_order() {
        let store = DedupStore::with_capacity(2);
        store.mark_notified("a");
        store.mark_notified("b");
        assert!(store.was_notified("a"));
        store.mark_notified("a");
        store.mark_notified("c");

        assert!(!store.was_notified("a"));
        assert!(store.was_notified("b"));
    }

    #[test]
    fn test_default_capacity_bound() {
        let store = DedupStore::new();
        let extra = 7;
        for i in 0..MAX_SIZE + extra {
            store.mark_notified(&format!("id-{i}"));
        }

        assert_eq!(store.len(), MAX_SIZE);
        for i in 0..extra {
            assert!(!store.was_notified(&format!("id-{i}")));
        }
        assert!(store.was_notified(&format!("id-{extra}")));
        assert!(store.was_notified(&format!("id-{}", MAX_SIZE + extra - 1)));
    }

    #[test]
    fn test_concurrent_claims() {
        let store = Arc::new(DedupStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.claim("same"))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
