//! Order persistence capability.
//!
//! An order is stored across four normalized tables: a delivery row with a
//! generated id, a payment row keyed by `transaction`, the order header
//! keyed by `order_uid`, and one row per item keyed by
//! `(track_number, chrt_id)`. A save writes all four in one atomic unit.
//! Re-saving an existing order, payment or item is a silent no-op for that
//! row; the delivery row is always inserted.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use orderly_core::{
    Delivery, Item, ItemKey, MissingJoin, Order, OrderResult, Payment, StorageError,
};

/// Durable order storage.
///
/// Implementations must guarantee that `save` is all-or-nothing and that a
/// reconstructed order's items are exactly the item rows sharing the
/// order's `track_number`.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist an order and its sub-records in one transaction.
    async fn save(&self, order: &Order) -> OrderResult<()>;

    /// Reconstruct a single order. `Ok(None)` means no such order exists.
    async fn get_by_uid(&self, order_uid: &str) -> OrderResult<Option<Order>>;

    /// Reconstruct every stored order.
    async fn get_all(&self) -> OrderResult<Vec<Order>>;

    /// Probe the backend. Used by readiness checks.
    async fn health_check(&self) -> OrderResult<()>;

    /// Short backend name for logs and metrics labels.
    fn backend_name(&self) -> &'static str;
}

// ============================================================================
// IN-MEMORY REPOSITORY
// ============================================================================

/// Header columns of a stored order plus its foreign keys.
#[derive(Debug, Clone)]
struct OrderRow {
    header: Order,
    delivery_id: i64,
    payment_transaction: String,
}

#[derive(Debug, Default)]
struct Tables {
    deliveries: BTreeMap<i64, Delivery>,
    next_delivery_id: i64,
    payments: HashMap<String, Payment>,
    orders: BTreeMap<String, OrderRow>,
    items: Vec<Item>,
    item_keys: HashSet<ItemKey>,
}

impl Tables {
    fn reconstruct(&self, row: &OrderRow) -> Result<Order, StorageError> {
        let delivery = self.deliveries.get(&row.delivery_id).cloned().ok_or_else(|| {
            StorageError::JoinInconsistency {
                order_uid: row.header.order_uid.clone(),
                missing: MissingJoin::Delivery,
            }
        })?;
        let payment = self
            .payments
            .get(&row.payment_transaction)
            .cloned()
            .ok_or_else(|| StorageError::JoinInconsistency {
                order_uid: row.header.order_uid.clone(),
                missing: MissingJoin::Payment,
            })?;
        let items = self
            .items
            .iter()
            .filter(|item| item.track_number == row.header.track_number)
            .cloned()
            .collect();

        Ok(Order {
            delivery,
            payment,
            items,
            ..row.header.clone()
        })
    }
}

/// In-memory repository with the same row-level semantics as the Postgres
/// schema. Used for tests and for running the service without a database.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    tables: RwLock<Tables>,
}

impl InMemoryOrderRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StorageError> {
        self.tables.write().map_err(|_| StorageError::LockPoisoned)
    }

    /// Number of delivery rows, including orphans left by replays.
    pub fn delivery_count(&self) -> OrderResult<usize> {
        Ok(self.read()?.deliveries.len())
    }

    /// Number of payment rows.
    pub fn payment_count(&self) -> OrderResult<usize> {
        Ok(self.read()?.payments.len())
    }

    /// Number of order header rows.
    pub fn order_count(&self) -> OrderResult<usize> {
        Ok(self.read()?.orders.len())
    }

    /// Number of item rows.
    pub fn item_count(&self) -> OrderResult<usize> {
        Ok(self.read()?.items.len())
    }

    /// Remove a payment row out from under its orders.
    ///
    /// Simulates a partially deleted database so reads can be checked for
    /// join-inconsistency reporting.
    pub fn delete_payment(&self, transaction: &str) -> OrderResult<bool> {
        Ok(self.write()?.payments.remove(transaction).is_some())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> OrderResult<()> {
        // The write guard is held for the whole save, so a concurrent
        // reader never observes a partially stored order.
        let mut tables = self.write()?;

        tables.next_delivery_id += 1;
        let delivery_id = tables.next_delivery_id;
        tables.deliveries.insert(delivery_id, order.delivery.clone());

        tables
            .payments
            .entry(order.payment.transaction.clone())
            .or_insert_with(|| order.payment.clone());

        tables
            .orders
            .entry(order.order_uid.clone())
            .or_insert_with(|| OrderRow {
                header: Order {
                    delivery: Delivery::default(),
                    payment: Payment::default(),
                    items: Vec::new(),
                    ..order.clone()
                },
                delivery_id,
                payment_transaction: order.payment.transaction.clone(),
            });

        for item in &order.items {
            if tables.item_keys.insert(item.key()) {
                tables.items.push(item.clone());
            }
        }

        Ok(())
    }

    async fn get_by_uid(&self, order_uid: &str) -> OrderResult<Option<Order>> {
        let tables = self.read()?;
        match tables.orders.get(order_uid) {
            Some(row) => Ok(Some(tables.reconstruct(row)?)),
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> OrderResult<Vec<Order>> {
        let tables = self.read()?;
        let mut orders = Vec::with_capacity(tables.orders.len());
        for row in tables.orders.values() {
            orders.push(tables.reconstruct(row)?);
        }
        Ok(orders)
    }

    async fn health_check(&self) -> OrderResult<()> {
        self.read()?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderly_core::OrderError;

    fn item(track: &str, chrt_id: i64) -> Item {
        Item {
            chrt_id,
            track_number: track.to_string(),
            price: 453,
            name: format!("item-{}", chrt_id),
            ..Default::default()
        }
    }

    fn make_order(uid: &str, track: &str, transaction: &str) -> Order {
        Order {
            order_uid: uid.to_string(),
            track_number: track.to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                city: "Kiryat Mozkin".to_string(),
                ..Default::default()
            },
            payment: Payment {
                transaction: transaction.to_string(),
                currency: "USD".to_string(),
                amount: 1817,
                ..Default::default()
            },
            items: vec![item(track, 1), item(track, 2)],
            locale: "en".to_string(),
            sm_id: 99,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_then_get_round_trips() {
        let repo = InMemoryOrderRepository::new();
        let order = make_order("o1", "T1", "tx1");
        repo.save(&order).await.expect("save");

        let loaded = repo.get_by_uid("o1").await.expect("read").expect("present");
        assert_eq!(loaded, order);
    }

    #[tokio::test]
    async fn test_get_unknown_is_none() {
        let repo = InMemoryOrderRepository::new();
        assert_eq!(repo.get_by_uid("nope").await.expect("read"), None);
        assert!(repo.get_all().await.expect("read").is_empty());
    }

    #[tokio::test]
    async fn test_replay_keeps_first_write_and_orphans_delivery() {
        let repo = InMemoryOrderRepository::new();
        let first = make_order("o1", "T1", "tx1");
        repo.save(&first).await.expect("first save");

        let mut replay = first.clone();
        replay.locale = "ru".to_string();
        replay.delivery.city = "Moscow".to_string();
        repo.save(&replay).await.expect("replay save");

        assert_eq!(repo.order_count().expect("count"), 1);
        assert_eq!(repo.payment_count().expect("count"), 1);
        assert_eq!(repo.item_count().expect("count"), 2);
        assert_eq!(repo.delivery_count().expect("count"), 2);

        let loaded = repo.get_by_uid("o1").await.expect("read").expect("present");
        assert_eq!(loaded, first);
    }

    #[tokio::test]
    async fn test_items_are_grouped_by_track_number() {
        let repo = InMemoryOrderRepository::new();
        repo.save(&make_order("o1", "T1", "tx1")).await.expect("save");
        repo.save(&make_order("o2", "T2", "tx2")).await.expect("save");

        let o1 = repo.get_by_uid("o1").await.expect("read").expect("present");
        assert_eq!(o1.items.len(), 2);
        assert!(o1.items.iter().all(|i| i.track_number == "T1"));
        assert_eq!(repo.item_count().expect("count"), 4);
    }

    #[tokio::test]
    async fn test_orders_sharing_track_share_items() {
        let repo = InMemoryOrderRepository::new();
        repo.save(&make_order("o1", "T1", "tx1")).await.expect("save");
        let mut second = make_order("o2", "T1", "tx2");
        second.items = vec![item("T1", 3)];
        repo.save(&second).await.expect("save");

        let o2 = repo.get_by_uid("o2").await.expect("read").expect("present");
        let ids: Vec<i64> = o2.items.iter().map(|i| i.chrt_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_payment_is_join_inconsistency() {
        let repo = InMemoryOrderRepository::new();
        repo.save(&make_order("o1", "T1", "tx1")).await.expect("save");
        assert!(repo.delete_payment("tx1").expect("delete"));

        let err = repo.get_by_uid("o1").await.expect_err("inconsistent");
        assert_eq!(
            err,
            OrderError::Storage(StorageError::JoinInconsistency {
                order_uid: "o1".to_string(),
                missing: MissingJoin::Payment,
            })
        );
        assert!(repo.get_all().await.is_err());
    }

    #[tokio::test]
    async fn test_get_all_returns_every_order() {
        let repo = InMemoryOrderRepository::new();
        for n in 0..5 {
            let uid = format!("o{}", n);
            let track = format!("T{}", n);
            let tx = format!("tx{}", n);
            repo.save(&make_order(&uid, &track, &tx)).await.expect("save");
        }

        let all = repo.get_all().await.expect("read");
        assert_eq!(all.len(), 5);
        assert!(all.iter().all(|o| o.items.len() == 2));
    }

    #[tokio::test]
    async fn test_health_check_and_backend_name() {
        let repo = InMemoryOrderRepository::new();
        assert!(repo.health_check().await.is_ok());
        assert_eq!(repo.backend_name(), "memory");
    }
}
