#![cfg(feature = "db-tests")]
//! Postgres Repository Tests
//!
//! Runs against the database described by the `ORDERLY_DB_*` variables.
//! The schema is applied before each test; every test uses fresh uids and
//! track numbers so runs can share a database.

use std::sync::atomic::{AtomicU64, Ordering};

use orderly_api::{DbClient, DbConfig, PostgresOrderRepository};
use orderly_core::{Item, OrderError};
use orderly_storage::OrderRepository;
use orderly_test_utils::{fixtures, Order};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);
static SCHEMA: tokio::sync::OnceCell<()> = tokio::sync::OnceCell::const_new();

fn unique(prefix: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let n = SEQUENCE.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}-{}", prefix, nanos, n)
}

async fn test_repository() -> PostgresOrderRepository {
    let db = DbClient::from_config(&DbConfig::from_env()).expect("pool");
    // Concurrent CREATE TABLE IF NOT EXISTS can still collide in the catalog.
    SCHEMA
        .get_or_init(|| async { db.apply_schema().await.expect("schema") })
        .await;
    PostgresOrderRepository::new(db)
}

fn fresh_order() -> Order {
    let uid = unique("order");
    let track = unique("TRACK");
    let mut order = fixtures::sample_order(&uid, &track);
    order.items.push(Item {
        chrt_id: 2,
        track_number: track,
        price: 100,
        name: "Lipstick".to_string(),
        ..Default::default()
    });
    order
}

#[tokio::test]
async fn save_then_get_round_trips() {
    let repo = test_repository().await;
    let order = fresh_order();

    repo.save(&order).await.expect("save");
    let stored = repo.get_by_uid(&order.order_uid).await.expect("read");
    assert_eq!(stored, Some(order));
}

#[tokio::test]
async fn sub_second_timestamps_survive_storage() {
    let repo = test_repository().await;
    let mut order = fresh_order();
    order.date_created = chrono::DateTime::from_timestamp(1_637_907_739, 123_456_789)
        .expect("valid timestamp");

    // Decoding from the wire truncates to what TIMESTAMPTZ keeps.
    let decoded = Order::from_json_slice(&fixtures::order_bytes(&order)).expect("decode");
    assert_eq!(decoded.date_created.timestamp_subsec_nanos(), 123_456_000);

    repo.save(&decoded).await.expect("save");
    let stored = repo.get_by_uid(&decoded.order_uid).await.expect("read");
    assert_eq!(stored, Some(decoded));
}

#[tokio::test]
async fn unknown_uid_is_none() {
    let repo = test_repository().await;
    let stored = repo.get_by_uid(&unique("missing")).await.expect("read");
    assert_eq!(stored, None);
}

#[tokio::test]
async fn replay_keeps_first_write() {
    let repo = test_repository().await;
    let order = fresh_order();
    repo.save(&order).await.expect("first save");

    let mut replay = order.clone();
    replay.locale = "ru".to_string();
    replay.payment.amount += 1;
    repo.save(&replay).await.expect("replayed save");

    let stored = repo
        .get_by_uid(&order.order_uid)
        .await
        .expect("read")
        .expect("present");
    assert_eq!(stored, order);
    assert_eq!(stored.items.len(), 2);
}

#[tokio::test]
async fn get_all_includes_saved_orders() {
    let repo = test_repository().await;
    let first = fresh_order();
    let second = fresh_order();
    repo.save(&first).await.expect("save");
    repo.save(&second).await.expect("save");

    let all = repo.get_all().await.expect("all");
    assert!(all.contains(&first));
    assert!(all.contains(&second));
}

#[tokio::test]
async fn health_check_succeeds() {
    let repo = test_repository().await;
    repo.health_check().await.expect("healthy");
    assert_eq!(repo.backend_name(), "postgres");
}

#[tokio::test]
async fn unreachable_database_is_a_storage_error() {
    let config = DbConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        ..DbConfig::from_env()
    };
    let repo = PostgresOrderRepository::new(DbClient::from_config(&config).expect("pool"));

    let result = repo.get_by_uid("anything").await;
    assert!(matches!(result, Err(OrderError::Storage(_))), "{:?}", result);
}
