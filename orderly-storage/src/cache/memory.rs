//! DashMap-backed order cache.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use orderly_core::Order;

use super::traits::{CacheStats, OrderCache};

/// Sharded concurrent map from `order_uid` to an owned [`Order`].
///
/// Values are cloned on the way in and on the way out, so callers never
/// share a mutable handle with the cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Order>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderCache for MemoryCache {
    fn set(&self, order_uid: &str, order: Order) {
        self.entries.insert(order_uid.to_string(), order);
    }

    fn get(&self, order_uid: &str) -> Option<Order> {
        match self.entries.get(order_uid) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn get_all(&self) -> Vec<Order> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn size(&self) -> usize {
        self.entries.len()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn order(uid: &str) -> Order {
        Order {
            order_uid: uid.to_string(),
            track_number: format!("TRACK-{}", uid),
            ..Default::default()
        }
    }

    #[test]
    fn test_set_then_get_returns_copy() {
        let cache = MemoryCache::new();
        cache.set("o1", order("o1"));

        let mut copy = cache.get("o1").expect("cached order");
        copy.locale = "mutated".to_string();

        let again = cache.get("o1").expect("cached order");
        assert!(again.locale.is_empty());
    }

    #[test]
    fn test_set_overwrites() {
        let cache = MemoryCache::new();
        cache.set("o1", order("o1"));
        let mut replacement = order("o1");
        replacement.entry = "WBIL".to_string();
        cache.set("o1", replacement.clone());

        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get("o1"), Some(replacement));
    }

    #[test]
    fn test_get_missing_counts_miss_without_inserting() {
        let cache = MemoryCache::new();
        assert!(cache.get("missing").is_none());
        assert_eq!(cache.size(), 0);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.entry_count, 0);
    }

    #[test]
    fn test_get_all_snapshot() {
        let cache = MemoryCache::new();
        for uid in ["a", "b", "c"] {
            cache.set(uid, order(uid));
        }

        let uids: BTreeSet<String> = cache.get_all().into_iter().map(|o| o.order_uid).collect();
        let expected: BTreeSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(uids, expected);
    }

    #[test]
    fn test_concurrent_writers_keep_key_space_intact() {
        let cache = Arc::new(MemoryCache::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        let uid = format!("w{}-{}", worker, i);
                        cache.set(&uid, order(&uid));
                        let _ = cache.get(&uid);
                        let _ = cache.size();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker thread panicked");
        }

        assert_eq!(cache.size(), 8 * 250);
        assert_eq!(cache.get_all().len(), 8 * 250);
        assert_eq!(cache.stats().hits, 8 * 250);
    }
}
