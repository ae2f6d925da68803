//! Orderly Test Utilities
//!
//! Shared test infrastructure for the Orderly workspace:
//! - Repository wrappers that count calls or inject failures
//! - Proptest generators for orders and their sub-records
//! - Fixtures for common scenarios
//! - Assertions over `OrderResult`

pub use orderly_storage::{InMemoryOrderRepository, MemoryCache, OrderCache, OrderRepository, OrderService};

pub use orderly_core::{
    Delivery, Item, Order, OrderError, OrderResult, Payment, StorageError, ValidationError,
};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

// ============================================================================
// REPOSITORY WRAPPERS
// ============================================================================

/// Repository wrapper that counts calls per method.
///
/// Used to prove cache hits never reach storage.
#[derive(Debug, Default)]
pub struct CountingRepository {
    inner: InMemoryOrderRepository,
    saves: AtomicUsize,
    gets: AtomicUsize,
    get_alls: AtomicUsize,
}

impl CountingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryOrderRepository {
        &self.inner
    }

    pub fn save_calls(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn get_all_calls(&self) -> usize {
        self.get_alls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderRepository for CountingRepository {
    async fn save(&self, order: &Order) -> OrderResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(order).await
    }

    async fn get_by_uid(&self, order_uid: &str) -> OrderResult<Option<Order>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_uid(order_uid).await
    }

    async fn get_all(&self) -> OrderResult<Vec<Order>> {
        self.get_alls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_all().await
    }

    async fn health_check(&self) -> OrderResult<()> {
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

/// Repository wrapper whose operations can be switched to fail.
///
/// Failures are reported as the storage errors a real backend produces: a
/// failed save is `TransactionFailed`, a failed read is `Unavailable`.
#[derive(Debug, Default)]
pub struct FailingRepository {
    inner: InMemoryOrderRepository,
    fail_saves: AtomicBool,
    fail_reads: AtomicBool,
}

impl FailingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository that refuses every operation.
    pub fn always_failing() -> Self {
        let repo = Self::default();
        repo.set_fail_saves(true);
        repo.set_fail_reads(true);
        repo
    }

    pub fn inner(&self) -> &InMemoryOrderRepository {
        &self.inner
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn read_error(&self) -> OrderResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "injected read failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for FailingRepository {
    async fn save(&self, order: &Order) -> OrderResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::TransactionFailed {
                step: "insert order".to_string(),
                reason: "injected save failure".to_string(),
            }
            .into());
        }
        self.inner.save(order).await
    }

    async fn get_by_uid(&self, order_uid: &str) -> OrderResult<Option<Order>> {
        self.read_error()?;
        self.inner.get_by_uid(order_uid).await
    }

    async fn get_all(&self) -> OrderResult<Vec<Order>> {
        self.read_error()?;
        self.inner.get_all().await
    }

    async fn health_check(&self) -> OrderResult<()> {
        self.read_error()
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Build a service over the given repository and a fresh cache.
pub fn service_with<R>(repository: Arc<R>) -> (OrderService, Arc<MemoryCache>)
where
    R: OrderRepository + 'static,
{
    let cache = Arc::new(MemoryCache::new());
    let service = OrderService::new(repository, cache.clone());
    (service, cache)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating order records.

    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    /// Generate an order uid.
    pub fn arb_order_uid() -> impl Strategy<Value = String> {
        "[a-z0-9]{8,24}"
    }

    /// Generate a track number.
    pub fn arb_track_number() -> impl Strategy<Value = String> {
        "WB[A-Z0-9]{6,14}"
    }

    /// Generate a creation time with microsecond precision (2020-2030),
    /// the finest precision storage keeps.
    pub fn arb_date_created() -> impl Strategy<Value = DateTime<Utc>> {
        (1577836800i64..1893456000i64, 0u32..1_000_000).prop_map(|(secs, micros)| {
            DateTime::from_timestamp(secs, micros * 1_000).unwrap_or_default()
        })
    }

    /// Generate a Delivery.
    pub fn arb_delivery() -> impl Strategy<Value = Delivery> {
        (
            "[A-Z][a-z]{2,10} [A-Z][a-z]{2,12}",
            "\\+[0-9]{10}",
            "[0-9]{6,7}",
            "[A-Z][a-z]{3,12}",
            "[A-Z][a-z]{3,10} [0-9]{1,3}",
            "[A-Z][a-z]{3,10}",
            "[a-z]{3,10}@[a-z]{3,8}\\.com",
        )
            .prop_map(|(name, phone, zip, city, address, region, email)| Delivery {
                name,
                phone,
                zip,
                city,
                address,
                region,
                email,
            })
    }

    /// Generate a Payment with the given transaction id.
    pub fn arb_payment(transaction: String) -> impl Strategy<Value = Payment> {
        (
            prop_oneof![Just("USD"), Just("EUR"), Just("RUB")],
            prop_oneof![Just("wbpay"), Just("card")],
            0i64..1_000_000,
            1_600_000_000i64..1_900_000_000,
            "[a-z]{3,8}",
            0i64..5_000,
            0i64..1_000_000,
            0i64..1_000,
        )
            .prop_map(
                move |(
                    currency,
                    provider,
                    amount,
                    payment_dt,
                    bank,
                    delivery_cost,
                    goods_total,
                    custom_fee,
                )| Payment {
                    transaction: transaction.clone(),
                    request_id: String::new(),
                    currency: currency.to_string(),
                    provider: provider.to_string(),
                    amount,
                    payment_dt,
                    bank,
                    delivery_cost,
                    goods_total,
                    custom_fee,
                },
            )
    }

    /// Generate an Item on the given track with the given chrt_id.
    pub fn arb_item(track_number: String, chrt_id: i64) -> impl Strategy<Value = Item> {
        (
            0i64..100_000,
            "[a-z0-9]{12,21}",
            "[A-Z][a-z]{3,12}",
            0i64..90,
            "[0-9]{1,2}",
            0i64..100_000,
            1i64..10_000_000,
            "[A-Z][a-z]{3,10}",
            prop_oneof![Just(202i64), Just(200i64), Just(404i64)],
        )
            .prop_map(
                move |(price, rid, name, sale, size, total_price, nm_id, brand, status)| Item {
                    chrt_id,
                    track_number: track_number.clone(),
                    price,
                    rid,
                    name,
                    sale,
                    size,
                    total_price,
                    nm_id,
                    brand,
                    status,
                },
            )
    }

    /// Generate a complete, valid order with a fixed uid.
    ///
    /// The payment transaction equals the uid and every item carries the
    /// order's track number with a distinct chrt_id.
    pub fn arb_order_with_uid(order_uid: String) -> impl Strategy<Value = Order> {
        (
            arb_track_number(),
            prop::collection::btree_set(1i64..10_000_000, 0..5),
        )
            .prop_flat_map(move |(track_number, chrt_ids)| {
                let items: Vec<_> = chrt_ids
                    .into_iter()
                    .map(|chrt_id| arb_item(track_number.clone(), chrt_id))
                    .collect();
                (
                    Just(order_uid.clone()),
                    Just(track_number),
                    arb_delivery(),
                    arb_payment(order_uid.clone()),
                    items,
                    prop_oneof![Just("en"), Just("ru")],
                    "[a-z]{0,8}",
                    "[0-9]{1,2}",
                    0i64..1000,
                    arb_date_created(),
                )
            })
            .prop_map(
                |(
                    order_uid,
                    track_number,
                    delivery,
                    payment,
                    items,
                    locale,
                    customer_id,
                    shardkey,
                    sm_id,
                    date_created,
                )| Order {
                    order_uid,
                    track_number,
                    entry: "WBIL".to_string(),
                    delivery,
                    payment,
                    items,
                    locale: locale.to_string(),
                    internal_signature: String::new(),
                    customer_id,
                    delivery_service: "meest".to_string(),
                    shardkey,
                    sm_id,
                    date_created,
                    oof_shard: "1".to_string(),
                },
            )
    }

    /// Generate a complete, valid order.
    pub fn arb_order() -> impl Strategy<Value = Order> {
        arb_order_uid().prop_flat_map(arb_order_with_uid)
    }

    /// Generate a batch of valid orders with distinct uids and distinct
    /// track numbers.
    pub fn arb_orders(max: usize) -> impl Strategy<Value = Vec<Order>> {
        prop::collection::btree_set(arb_order_uid(), 1..=max.max(1))
            .prop_flat_map(|uids| {
                uids.into_iter()
                    .map(arb_order_with_uid)
                    .collect::<Vec<_>>()
            })
            .prop_map(|mut orders| {
                for (n, order) in orders.iter_mut().enumerate() {
                    let track_number = format!("{}-{}", order.track_number, n);
                    for item in &mut order.items {
                        item.track_number = track_number.clone();
                    }
                    order.track_number = track_number;
                }
                orders
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built orders for common scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};

    /// The canonical order message as published on the bus.
    pub const MODEL_ORDER_JSON: &str = r#"{
  "order_uid": "b563feb7b2b84b6test",
  "track_number": "WBILMTESTTRACK",
  "entry": "WBIL",
  "delivery": {
    "name": "Test Testov",
    "phone": "+9720000000",
    "zip": "2639809",
    "city": "Kiryat Mozkin",
    "address": "Ploshad Mira 15",
    "region": "Kraiot",
    "email": "test@gmail.com"
  },
  "payment": {
    "transaction": "b563feb7b2b84b6test",
    "request_id": "",
    "currency": "USD",
    "provider": "wbpay",
    "amount": 1817,
    "payment_dt": 1637907727,
    "bank": "alpha",
    "delivery_cost": 1500,
    "goods_total": 317,
    "custom_fee": 0
  },
  "items": [
    {
      "chrt_id": 9934930,
      "track_number": "WBILMTESTTRACK",
      "price": 453,
      "rid": "ab4219087a764ae0btest",
      "name": "Mascaras",
      "sale": 30,
      "size": "0",
      "total_price": 317,
      "nm_id": 2389212,
      "brand": "Vivienne Sabo",
      "status": 202
    }
  ],
  "locale": "en",
  "internal_signature": "",
  "customer_id": "test",
  "delivery_service": "meest",
  "shardkey": "9",
  "sm_id": 99,
  "date_created": "2021-11-26T06:22:19Z",
  "oof_shard": "1"
}"#;

    /// The model order, decoded.
    pub fn model_order() -> Order {
        Order {
            order_uid: "b563feb7b2b84b6test".to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: "test@gmail.com".to_string(),
            },
            payment: Payment {
                transaction: "b563feb7b2b84b6test".to_string(),
                request_id: String::new(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                payment_dt: 1637907727,
                bank: "alpha".to_string(),
                delivery_cost: 1500,
                goods_total: 317,
                custom_fee: 0,
            },
            items: vec![Item {
                chrt_id: 9934930,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 453,
                rid: "ab4219087a764ae0btest".to_string(),
                name: "Mascaras".to_string(),
                sale: 30,
                size: "0".to_string(),
                total_price: 317,
                nm_id: 2389212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            }],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: Utc
                .with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
                .single()
                .unwrap_or_default(),
            oof_shard: "1".to_string(),
        }
    }

    /// A small valid order. The payment transaction equals the uid.
    pub fn sample_order(order_uid: &str, track_number: &str) -> Order {
        Order {
            order_uid: order_uid.to_string(),
            track_number: track_number.to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                city: "Kiryat Mozkin".to_string(),
                ..Default::default()
            },
            payment: Payment {
                transaction: order_uid.to_string(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                ..Default::default()
            },
            items: vec![Item {
                chrt_id: 1,
                track_number: track_number.to_string(),
                price: 453,
                name: "Mascaras".to_string(),
                ..Default::default()
            }],
            locale: "en".to_string(),
            sm_id: 99,
            date_created: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Serialize an order to the bytes a publisher would send.
    pub fn order_bytes(order: &Order) -> Vec<u8> {
        serde_json::to_vec(order).unwrap_or_default()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over `OrderResult` values.

    use super::*;

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &OrderResult<T>) {
        match result {
            Err(err) if err.is_not_found() => {}
            other => panic!("Expected NotFound, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &OrderResult<T>) {
        match result {
            Err(OrderError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert two order sets are equal ignoring order.
    #[track_caller]
    pub fn assert_same_orders(mut actual: Vec<Order>, mut expected: Vec<Order>) {
        actual.sort_by(|a, b| a.order_uid.cmp(&b.order_uid));
        expected.sort_by(|a, b| a.order_uid.cmp(&b.order_uid));
        assert_eq!(actual, expected);
    }
}

// ============================================================================
// TESTS
// ============================================================================
