//! Orderly Service Entry Point
//!
//! Bootstraps configuration, restores the order cache from Postgres,
//! subscribes to the order subject and starts the Axum HTTP server.

use std::sync::Arc;

use orderly_api::telemetry::{init_tracing, TelemetryConfig};
use orderly_api::{
    create_router, ApiError, ApiResult, AppConfig, AppState, DbClient, IngestPipeline,
    NatsSubscriber, PostgresOrderRepository,
};
use orderly_storage::{MemoryCache, OrderService};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::from_env())?;

    let config = AppConfig::from_env();
    let db = DbClient::from_config(&config.db)?;

    if config.db.init_schema {
        db.apply_schema().await?;
        tracing::info!("Database schema applied");
    }

    let repository = Arc::new(PostgresOrderRepository::new(db));
    let cache = Arc::new(MemoryCache::new());
    let service = OrderService::new(repository, cache);

    tracing::info!("Restoring cache from storage");
    let restored = service.restore_cache().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to restore cache from storage");
        ApiError::from(e)
    })?;
    tracing::info!(restored, cache_size = service.cache().size(), "Cache restored");

    let subscriber = NatsSubscriber::connect(&config.bus).await?;
    let mut ingest = subscriber
        .spawn(IngestPipeline::new(service.clone()))
        .await?;

    let app = create_router(AppState::new(service), &config.api);

    let addr = config.api.bind_addr()?;
    tracing::info!(%addr, "Starting Orderly API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        finished = &mut ingest => {
            match finished {
                Ok(stats) => tracing::error!(?stats, "Order subscription closed"),
                Err(e) => tracing::error!(error = %e, "Ingest task failed"),
            }
            return Err(ApiError::service_unavailable("Order subscription ended"));
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    ingest.abort();
    Ok(())
}
