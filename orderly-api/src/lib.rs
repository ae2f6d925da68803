//! Orderly API - Order Ingestion and Read Service
//!
//! Consumes order records from NATS, persists them transactionally in
//! Postgres, keeps an in-memory cache warm, and serves orders over HTTP.
//!
//! - [`ingest`]: bus subscription and the per-message pipeline
//! - [`db`]: connection pool and the Postgres order repository
//! - [`routes`]: axum routers for orders, health, metrics and OpenAPI
//! - [`telemetry`]: tracing setup and Prometheus metrics

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::{ApiConfig, AppConfig, BusConfig};
pub use db::{DbClient, DbConfig, PostgresOrderRepository};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use ingest::{IngestOutcome, IngestPipeline, IngestStats, NatsSubscriber};
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::AppState;
