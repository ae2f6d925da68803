//! Order Publisher Binary
//!
//! Publishes order JSON files to the order subject, for seeding a local
//! stack or replaying a record.
//!
//! Usage:
//!   cargo run -p orderly-api --bin publish-order -- order.json [more.json ...]
//!
//! Bus settings come from the same `ORDERLY_NATS_*` variables the service
//! reads.

use orderly_api::{ApiError, ApiResult, BusConfig};
use orderly_core::Order;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        return Err(ApiError::invalid_input(
            "usage: publish-order <order.json> [more.json ...]",
        ));
    }

    let config = BusConfig::from_env();
    let client = async_nats::ConnectOptions::new()
        .name(format!("{}-publisher", config.client_name))
        .connect(config.url.as_str())
        .await
        .map_err(|e| {
            ApiError::service_unavailable(format!("Failed to connect to NATS at {}: {}", config.url, e))
        })?;

    for path in &paths {
        let payload = std::fs::read(path)
            .map_err(|e| ApiError::invalid_input(format!("Failed to read {}: {}", path, e)))?;

        // Catch obviously broken files before they reach the bus.
        let _: serde_json::Value = serde_json::from_slice(&payload)?;
        match Order::from_json_slice(&payload) {
            Ok(order) => match order.validate() {
                Ok(()) => println!("publishing {} from {}", order.order_uid, path),
                Err(e) => eprintln!("warning: {} will be discarded by consumers: {}", path, e),
            },
            Err(e) => eprintln!("warning: {} is not an order record: {}", path, e),
        }

        client
            .publish(config.subject.clone(), bytes::Bytes::from(payload))
            .await
            .map_err(|e| ApiError::service_unavailable(format!("Failed to publish {}: {}", path, e)))?;
    }

    client
        .flush()
        .await
        .map_err(|e| ApiError::service_unavailable(format!("Failed to flush: {}", e)))?;

    println!("published {} message(s) to {}", paths.len(), config.subject);
    Ok(())
}
