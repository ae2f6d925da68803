//! Cache capability trait and usage statistics.

use orderly_core::Order;

/// Cache capability for pluggable order cache implementations.
///
/// All methods are synchronous and must be safe to call concurrently from
/// any number of tasks without external locking. Enumeration (`get_all`,
/// `size`) is best-effort: a concurrent `set` may or may not be observed.
pub trait OrderCache: Send + Sync {
    /// Insert or overwrite the entry for `order_uid`.
    fn set(&self, order_uid: &str, order: Order);

    /// Get a copy of the cached order, if present.
    fn get(&self, order_uid: &str) -> Option<Order>;

    /// Snapshot of every cached order, in no particular order.
    fn get_all(&self) -> Vec<Order>;

    /// Number of distinct keys at call time.
    fn size(&self) -> usize;

    /// Get cache statistics.
    fn stats(&self) -> CacheStats;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
