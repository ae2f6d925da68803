//! OpenAPI Specification for the Orderly API

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::{health, order};
use crate::telemetry::metrics;
use orderly_core::{Delivery, Item, Order, Payment};

/// OpenAPI document for the Orderly read API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Orderly API",
        version = "0.1.0",
        description = "Read API over orders ingested from the order bus",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local Development")
    ),
    tags(
        (name = "Orders", description = "Order lookup and listing"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        order::get_order,
        order::list_orders,
        health::health,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            Order,
            Delivery,
            Payment,
            Item,
            ApiError,
            ErrorCode,
            health::StatusResponse,
            health::HealthResponse,
            health::HealthStatus,
            health::HealthDetails,
            health::ComponentHealth,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_order_routes() -> Result<(), serde_json::Error> {
        let doc = serde_json::to_value(ApiDoc::openapi())?;
        let paths = &doc["paths"];
        assert!(paths.get("/api/order/{id}").is_some());
        assert!(paths.get("/api/orders").is_some());
        assert!(paths.get("/health/ready").is_some());
        assert!(doc["components"]["schemas"].get("Order").is_some());
        Ok(())
    }
}
