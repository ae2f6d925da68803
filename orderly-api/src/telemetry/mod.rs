//! Orderly Telemetry - Observability Infrastructure
//!
//! Structured logging through tracing-subscriber and Prometheus metrics
//! for the HTTP surface, the database and the ingestion pipeline.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, OrderlyMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, TelemetryConfig};
