//! Order service: the single writer path and the cache-aside read path.

use std::sync::Arc;

use orderly_core::{Order, OrderError, OrderResult};
use tracing::{debug, info, instrument};

use crate::cache::{CacheStats, OrderCache};
use crate::repository::OrderRepository;

/// Coordinates the repository and the cache.
///
/// Invariants:
/// - an order is cached only after its save committed, or after it was
///   read back from the repository;
/// - a failed save leaves the cache untouched.
#[derive(Clone)]
pub struct OrderService {
    repository: Arc<dyn OrderRepository>,
    cache: Arc<dyn OrderCache>,
}

impl OrderService {
    pub fn new(repository: Arc<dyn OrderRepository>, cache: Arc<dyn OrderCache>) -> Self {
        Self { repository, cache }
    }

    pub fn repository(&self) -> &Arc<dyn OrderRepository> {
        &self.repository
    }

    pub fn cache(&self) -> &Arc<dyn OrderCache> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Persist an order, then cache it.
    #[instrument(skip_all, fields(order_uid = %order.order_uid))]
    pub async fn create_order(&self, order: &Order) -> OrderResult<()> {
        self.repository.save(order).await?;
        self.cache.set(&order.order_uid, order.clone());
        debug!("order persisted and cached");
        Ok(())
    }

    /// Cache-aside lookup.
    ///
    /// A hit never touches the repository. A miss reads the repository and
    /// populates the cache on success.
    #[instrument(skip(self))]
    pub async fn get_order_by_uid(&self, order_uid: &str) -> OrderResult<Order> {
        if let Some(order) = self.cache.get(order_uid) {
            debug!("cache hit");
            return Ok(order);
        }

        match self.repository.get_by_uid(order_uid).await? {
            Some(order) => {
                self.cache.set(order_uid, order.clone());
                debug!("cache miss, loaded from repository");
                Ok(order)
            }
            None => Err(OrderError::not_found(order_uid)),
        }
    }

    /// Every stored order, straight from the repository.
    pub async fn get_all_orders(&self) -> OrderResult<Vec<Order>> {
        self.repository.get_all().await
    }

    /// Load every stored order into the cache.
    ///
    /// Returns the number of orders restored. On error the cache may hold
    /// nothing from this pass; callers are expected to treat that as fatal
    /// at startup.
    #[instrument(skip(self), fields(backend = self.repository.backend_name()))]
    pub async fn restore_cache(&self) -> OrderResult<usize> {
        let orders = self.repository.get_all().await?;
        let restored = orders.len();
        for order in orders {
            let order_uid = order.order_uid.clone();
            self.cache.set(&order_uid, order);
        }
        info!(restored, cache_size = self.cache.size(), "cache restored from storage");
        Ok(restored)
    }
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("backend", &self.repository.backend_name())
            .field("cache_size", &self.cache.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::repository::InMemoryOrderRepository;
    use async_trait::async_trait;
    use orderly_core::StorageError;

    /// Repository whose writes always fail.
    struct ReadOnlyRepository;

    #[async_trait]
    impl OrderRepository for ReadOnlyRepository {
        async fn save(&self, _order: &Order) -> OrderResult<()> {
            Err(StorageError::TransactionFailed {
                step: "insert delivery".to_string(),
                reason: "read-only".to_string(),
            }
            .into())
        }

        async fn get_by_uid(&self, _order_uid: &str) -> OrderResult<Option<Order>> {
            Ok(None)
        }

        async fn get_all(&self) -> OrderResult<Vec<Order>> {
            Err(StorageError::Unavailable {
                reason: "read-only".to_string(),
            }
            .into())
        }

        async fn health_check(&self) -> OrderResult<()> {
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "read-only"
        }
    }

    fn order(uid: &str) -> Order {
        Order {
            order_uid: uid.to_string(),
            track_number: format!("T-{}", uid),
            ..Default::default()
        }
    }

    fn service() -> (OrderService, Arc<InMemoryOrderRepository>, Arc<MemoryCache>) {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let cache = Arc::new(MemoryCache::new());
        let service = OrderService::new(repo.clone(), cache.clone());
        (service, repo, cache)
    }

    #[tokio::test]
    async fn test_create_order_writes_through() {
        let (service, repo, cache) = service();
        service.create_order(&order("o1")).await.expect("create");

        assert_eq!(repo.order_count().expect("count"), 1);
        assert_eq!(cache.size(), 1);
        assert_eq!(service.get_order_by_uid("o1").await.expect("read"), order("o1"));
    }

    #[tokio::test]
    async fn test_failed_save_leaves_cache_untouched() {
        let cache = Arc::new(MemoryCache::new());
        let service = OrderService::new(Arc::new(ReadOnlyRepository), cache.clone());

        let err = service.create_order(&order("o1")).await.expect_err("save fails");
        assert!(matches!(
            err,
            OrderError::Storage(StorageError::TransactionFailed { .. })
        ));
        assert_eq!(cache.size(), 0);
    }

    #[tokio::test]
    async fn test_miss_populates_cache() {
        let (service, repo, cache) = service();
        repo.save(&order("o1")).await.expect("save");
        assert_eq!(cache.size(), 0);

        service.get_order_by_uid("o1").await.expect("read");
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.stats().misses, 1);

        service.get_order_by_uid("o1").await.expect("read");
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_unknown_uid_is_not_found_and_not_cached() {
        let (service, _repo, cache) = service();
        let err = service.get_order_by_uid("ghost").await.expect_err("missing");
        assert!(err.is_not_found());
        assert_eq!(cache.size(), 0);
    }

    #[tokio::test]
    async fn test_restore_cache_loads_everything() {
        let (service, repo, cache) = service();
        for uid in ["a", "b", "c"] {
            repo.save(&order(uid)).await.expect("save");
        }

        assert_eq!(service.restore_cache().await.expect("restore"), 3);
        assert_eq!(cache.size(), 3);
    }

    #[tokio::test]
    async fn test_restore_cache_propagates_failure() {
        let cache = Arc::new(MemoryCache::new());
        let service = OrderService::new(Arc::new(ReadOnlyRepository), cache.clone());
        assert!(service.restore_cache().await.is_err());
        assert_eq!(cache.size(), 0);
    }
}
