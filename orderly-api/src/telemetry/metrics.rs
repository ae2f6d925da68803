//! Prometheus Metrics Definitions
//!
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use orderly_storage::CacheStats;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, register_int_counter,
    CounterVec, Encoder, Gauge, HistogramVec, IntCounter, TextEncoder,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// HTTP request latency buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Database operation latency buckets (seconds)
const DB_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Global metrics instance - registered on first use
pub static METRICS: Lazy<ApiResult<OrderlyMetrics>> = Lazy::new(OrderlyMetrics::new);

/// The registered metrics, or `None` if registration failed.
pub fn metrics() -> Option<&'static OrderlyMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all Orderly metrics.
#[derive(Clone)]
pub struct OrderlyMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Database operation counter - labels: operation, status
    pub db_operations_total: CounterVec,

    /// Database operation duration histogram - labels: operation
    pub db_operation_duration_seconds: HistogramVec,

    /// Bus messages by outcome - labels: outcome
    pub ingest_messages_total: CounterVec,

    /// Cached orders
    pub cache_entries: Gauge,

    /// Cache hits since startup
    pub cache_hits_total: IntCounter,

    /// Cache misses since startup
    pub cache_misses_total: IntCounter,
}

fn registration_error(name: &str, err: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, err))
}

impl OrderlyMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "orderly_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "orderly_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            db_operations_total: register_counter_vec!(
                "orderly_db_operations_total",
                "Total number of database operations",
                &["operation", "status"]
            )
            .map_err(|e| registration_error("db_operations_total", e))?,

            db_operation_duration_seconds: register_histogram_vec!(
                "orderly_db_operation_duration_seconds",
                "Database operation duration in seconds",
                &["operation"],
                DB_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("db_operation_duration_seconds", e))?,

            ingest_messages_total: register_counter_vec!(
                "orderly_ingest_messages_total",
                "Order bus messages processed, by outcome",
                &["outcome"]
            )
            .map_err(|e| registration_error("ingest_messages_total", e))?,

            cache_entries: register_gauge!(
                "orderly_cache_entries",
                "Number of orders held in the in-memory cache"
            )
            .map_err(|e| registration_error("cache_entries", e))?,

            cache_hits_total: register_int_counter!(
                "orderly_cache_hits_total",
                "Order cache hits since startup"
            )
            .map_err(|e| registration_error("cache_hits_total", e))?,

            cache_misses_total: register_int_counter!(
                "orderly_cache_misses_total",
                "Order cache misses since startup"
            )
            .map_err(|e| registration_error("cache_misses_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a database operation.
    pub fn record_db_operation(&self, operation: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.db_operations_total
            .with_label_values(&[operation, status])
            .inc();
        self.db_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Record the outcome of one bus message.
    pub fn record_ingest(&self, outcome: &str) {
        self.ingest_messages_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Publish a cache statistics snapshot.
    ///
    /// The cache keeps cumulative hit and miss counts; the counters advance
    /// by whatever the snapshot adds on top of their current value and never
    /// move backwards.
    pub fn set_cache_stats(&self, stats: &CacheStats) {
        self.cache_entries.set(stats.entry_count as f64);
        advance_to(&self.cache_hits_total, stats.hits);
        advance_to(&self.cache_misses_total, stats.misses);
    }
}

fn advance_to(counter: &IntCounter, total: u64) {
    let delta = total.saturating_sub(counter.get());
    if delta > 0 {
        counter.inc_by(delta);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics. Cache gauges are refreshed from
/// the live cache on every scrape.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(metrics) = metrics() {
        metrics.set_cache_stats(&state.service.cache_stats());
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
