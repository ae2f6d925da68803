//! Database Connection Pool and Postgres Order Repository
//!
//! PostgreSQL connection pooling via deadpool-postgres, and the
//! [`OrderRepository`] implementation over the four order tables defined in
//! `schema.sql`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime};
use orderly_core::{
    Delivery, Item, MissingJoin, Order, OrderResult, Payment, StorageError,
};
use orderly_storage::OrderRepository;
use tokio_postgres::types::FromSql;
use tokio_postgres::{NoTls, Row};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::telemetry::metrics;

/// Idempotent DDL for the order tables.
pub const SCHEMA_SQL: &str = include_str!("../schema.sql");

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
    /// Apply `schema.sql` at startup
    pub init_schema: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "order_service".to_string(),
            user: "order_user".to_string(),
            password: String::new(),
            max_size: 16,
            timeout: Duration::from_secs(30),
            init_schema: false,
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// - `ORDERLY_DB_HOST`, `ORDERLY_DB_PORT`, `ORDERLY_DB_NAME`, `ORDERLY_DB_USER`,
    ///   `ORDERLY_DB_PASSWORD`
    /// - `ORDERLY_DB_POOL_SIZE`: maximum pool size
    /// - `ORDERLY_DB_TIMEOUT`: connect and pool wait timeout in seconds
    /// - `ORDERLY_DB_INIT_SCHEMA`: `true`/`1` applies `schema.sql` at startup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("ORDERLY_DB_HOST").unwrap_or(defaults.host),
            port: lookup("ORDERLY_DB_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: lookup("ORDERLY_DB_NAME").unwrap_or(defaults.dbname),
            user: lookup("ORDERLY_DB_USER").unwrap_or(defaults.user),
            password: lookup("ORDERLY_DB_PASSWORD").unwrap_or(defaults.password),
            max_size: lookup("ORDERLY_DB_POOL_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: lookup("ORDERLY_DB_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            init_schema: lookup("ORDERLY_DB_INIT_SCHEMA")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.init_schema),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Database client that wraps a connection pool.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> Result<deadpool_postgres::Object, PoolError> {
        self.pool.get().await
    }

    /// Apply the bundled schema. Every statement is `IF NOT EXISTS`.
    pub async fn apply_schema(&self) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA_SQL).await?;
        Ok(())
    }
}

// ============================================================================
// SQL
// ============================================================================

const INSERT_DELIVERY: &str = "INSERT INTO delivery (name, phone, zip, city, address, region, email) \
     VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id";

const INSERT_PAYMENT: &str = "INSERT INTO payment (transaction, request_id, currency, provider, amount, \
     payment_dt, bank, delivery_cost, goods_total, custom_fee) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
     ON CONFLICT (transaction) DO NOTHING";

const INSERT_ORDER: &str = "INSERT INTO orders (order_uid, track_number, entry, delivery_id, \
     payment_transaction, locale, internal_signature, customer_id, delivery_service, shardkey, \
     sm_id, date_created, oof_shard) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
     ON CONFLICT (order_uid) DO NOTHING";

const INSERT_ITEM: &str = "INSERT INTO items (chrt_id, track_number, price, rid, name, sale, size, \
     total_price, nm_id, brand, status) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
     ON CONFLICT (track_number, chrt_id) DO NOTHING";

/// Order header joined to its delivery and payment. LEFT JOINs so a missing
/// side surfaces as NULLs instead of silently dropping the order.
const SELECT_ORDERS: &str = "SELECT o.order_uid, o.track_number, o.entry, o.locale, \
     o.internal_signature, o.customer_id, o.delivery_service, o.shardkey, o.sm_id, \
     o.date_created, o.oof_shard, \
     d.id, d.name, d.phone, d.zip, d.city, d.address, d.region, d.email, \
     p.transaction, p.request_id, p.currency, p.provider, p.amount, p.payment_dt, p.bank, \
     p.delivery_cost, p.goods_total, p.custom_fee \
     FROM orders o \
     LEFT JOIN delivery d ON d.id = o.delivery_id \
     LEFT JOIN payment p ON p.transaction = o.payment_transaction";

const SELECT_ITEMS: &str = "SELECT chrt_id, track_number, price, rid, name, sale, size, \
     total_price, nm_id, brand, status FROM items";

// ============================================================================
// ROW MAPPING
// ============================================================================

fn query_failed(operation: &str, err: tokio_postgres::Error) -> StorageError {
    if err.is_closed() {
        return StorageError::Unavailable {
            reason: err.to_string(),
        };
    }
    StorageError::QueryFailed {
        operation: operation.to_string(),
        reason: err.to_string(),
    }
}

fn transaction_failed(step: &str, err: tokio_postgres::Error) -> StorageError {
    if err.is_closed() {
        return StorageError::Unavailable {
            reason: err.to_string(),
        };
    }
    StorageError::TransactionFailed {
        step: step.to_string(),
        reason: err.to_string(),
    }
}

fn pool_unavailable(err: PoolError) -> StorageError {
    StorageError::Unavailable {
        reason: err.to_string(),
    }
}

fn column<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Result<T, StorageError> {
    row.try_get(idx).map_err(|e| StorageError::QueryFailed {
        operation: "decode row".to_string(),
        reason: e.to_string(),
    })
}

/// Map a `SELECT_ORDERS` row to an order without items.
fn order_from_row(row: &Row) -> Result<Order, StorageError> {
    let order_uid: String = column(row, 0)?;

    let delivery_id: Option<i64> = column(row, 11)?;
    if delivery_id.is_none() {
        return Err(StorageError::JoinInconsistency {
            order_uid,
            missing: MissingJoin::Delivery,
        });
    }
    let transaction: Option<String> = column(row, 19)?;
    let Some(transaction) = transaction else {
        return Err(StorageError::JoinInconsistency {
            order_uid,
            missing: MissingJoin::Payment,
        });
    };

    Ok(Order {
        order_uid,
        track_number: column(row, 1)?,
        entry: column(row, 2)?,
        locale: column(row, 3)?,
        internal_signature: column(row, 4)?,
        customer_id: column(row, 5)?,
        delivery_service: column(row, 6)?,
        shardkey: column(row, 7)?,
        sm_id: column(row, 8)?,
        date_created: column(row, 9)?,
        oof_shard: column(row, 10)?,
        delivery: Delivery {
            name: column(row, 12)?,
            phone: column(row, 13)?,
            zip: column(row, 14)?,
            city: column(row, 15)?,
            address: column(row, 16)?,
            region: column(row, 17)?,
            email: column(row, 18)?,
        },
        payment: Payment {
            transaction,
            request_id: column(row, 20)?,
            currency: column(row, 21)?,
            provider: column(row, 22)?,
            amount: column(row, 23)?,
            payment_dt: column(row, 24)?,
            bank: column(row, 25)?,
            delivery_cost: column(row, 26)?,
            goods_total: column(row, 27)?,
            custom_fee: column(row, 28)?,
        },
        items: Vec::new(),
    })
}

fn item_from_row(row: &Row) -> Result<Item, StorageError> {
    Ok(Item {
        chrt_id: column(row, 0)?,
        track_number: column(row, 1)?,
        price: column(row, 2)?,
        rid: column(row, 3)?,
        name: column(row, 4)?,
        sale: column(row, 5)?,
        size: column(row, 6)?,
        total_price: column(row, 7)?,
        nm_id: column(row, 8)?,
        brand: column(row, 9)?,
        status: column(row, 10)?,
    })
}

// ============================================================================
// POSTGRES ORDER REPOSITORY
// ============================================================================

/// [`OrderRepository`] over Postgres.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    db: DbClient,
}

impl PostgresOrderRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    async fn save_in_transaction(&self, order: &Order) -> Result<(), StorageError> {
        let mut conn = self.db.get_conn().await.map_err(pool_unavailable)?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| transaction_failed("begin", e))?;

        let delivery = &order.delivery;
        let row = tx
            .query_one(
                INSERT_DELIVERY,
                &[
                    &delivery.name,
                    &delivery.phone,
                    &delivery.zip,
                    &delivery.city,
                    &delivery.address,
                    &delivery.region,
                    &delivery.email,
                ],
            )
            .await
            .map_err(|e| transaction_failed("insert delivery", e))?;
        let delivery_id: i64 = column(&row, 0)?;

        let payment = &order.payment;
        tx.execute(
            INSERT_PAYMENT,
            &[
                &payment.transaction,
                &payment.request_id,
                &payment.currency,
                &payment.provider,
                &payment.amount,
                &payment.payment_dt,
                &payment.bank,
                &payment.delivery_cost,
                &payment.goods_total,
                &payment.custom_fee,
            ],
        )
        .await
        .map_err(|e| transaction_failed("insert payment", e))?;

        tx.execute(
            INSERT_ORDER,
            &[
                &order.order_uid,
                &order.track_number,
                &order.entry,
                &delivery_id,
                &payment.transaction,
                &order.locale,
                &order.internal_signature,
                &order.customer_id,
                &order.delivery_service,
                &order.shardkey,
                &order.sm_id,
                &order.date_created,
                &order.oof_shard,
            ],
        )
        .await
        .map_err(|e| transaction_failed("insert order", e))?;

        if !order.items.is_empty() {
            let stmt = tx
                .prepare_cached(INSERT_ITEM)
                .await
                .map_err(|e| transaction_failed("prepare item insert", e))?;
            for item in &order.items {
                tx.execute(
                    &stmt,
                    &[
                        &item.chrt_id,
                        &item.track_number,
                        &item.price,
                        &item.rid,
                        &item.name,
                        &item.sale,
                        &item.size,
                        &item.total_price,
                        &item.nm_id,
                        &item.brand,
                        &item.status,
                    ],
                )
                .await
                .map_err(|e| transaction_failed("insert item", e))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| transaction_failed("commit", e))?;

        debug!(order_uid = %order.order_uid, delivery_id, "order saved");
        Ok(())
    }

    async fn select_by_uid(&self, order_uid: &str) -> Result<Option<Order>, StorageError> {
        let conn = self.db.get_conn().await.map_err(pool_unavailable)?;

        let sql = format!("{} WHERE o.order_uid = $1", SELECT_ORDERS);
        let row = conn
            .query_opt(sql.as_str(), &[&order_uid])
            .await
            .map_err(|e| query_failed("get order", e))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut order = order_from_row(&row)?;

        let sql = format!("{} WHERE track_number = $1 ORDER BY id", SELECT_ITEMS);
        let rows = conn
            .query(sql.as_str(), &[&order.track_number])
            .await
            .map_err(|e| query_failed("get items", e))?;
        order.items = rows.iter().map(item_from_row).collect::<Result<_, _>>()?;

        Ok(Some(order))
    }

    async fn select_all(&self) -> Result<Vec<Order>, StorageError> {
        let conn = self.db.get_conn().await.map_err(pool_unavailable)?;

        let sql = format!("{} ORDER BY o.date_created, o.order_uid", SELECT_ORDERS);
        let rows = conn
            .query(sql.as_str(), &[])
            .await
            .map_err(|e| query_failed("list orders", e))?;
        let mut orders = rows
            .iter()
            .map(order_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }

        let mut tracks: Vec<String> = orders.iter().map(|o| o.track_number.clone()).collect();
        tracks.sort();
        tracks.dedup();

        let sql = format!("{} WHERE track_number = ANY($1) ORDER BY id", SELECT_ITEMS);
        let rows = conn
            .query(sql.as_str(), &[&tracks])
            .await
            .map_err(|e| query_failed("list items", e))?;

        let mut items_by_track: HashMap<String, Vec<Item>> = HashMap::new();
        for row in &rows {
            let item = item_from_row(row)?;
            items_by_track
                .entry(item.track_number.clone())
                .or_default()
                .push(item);
        }
        for order in &mut orders {
            if let Some(items) = items_by_track.get(&order.track_number) {
                order.items = items.clone();
            }
        }

        Ok(orders)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let conn = self.db.get_conn().await.map_err(pool_unavailable)?;
        conn.query_one("SELECT 1", &[])
            .await
            .map_err(|e| query_failed("health check", e))?;
        Ok(())
    }
}

/// Time an operation and record it in the DB metrics.
async fn timed<T, F>(operation: &'static str, fut: F) -> OrderResult<T>
where
    F: std::future::Future<Output = Result<T, StorageError>>,
{
    let start = Instant::now();
    let result = fut.await;
    if let Some(metrics) = metrics::metrics() {
        metrics.record_db_operation(operation, result.is_ok(), start.elapsed().as_secs_f64());
    }
    Ok(result?)
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn save(&self, order: &Order) -> OrderResult<()> {
        timed("save", self.save_in_transaction(order)).await
    }

    async fn get_by_uid(&self, order_uid: &str) -> OrderResult<Option<Order>> {
        timed("get_by_uid", self.select_by_uid(order_uid)).await
    }

    async fn get_all(&self) -> OrderResult<Vec<Order>> {
        timed("get_all", self.select_all()).await
    }

    async fn health_check(&self) -> OrderResult<()> {
        timed("health_check", self.ping()).await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
