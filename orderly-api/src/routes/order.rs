//! Order REST API Routes

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use orderly_core::Order;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/order/{id} - Get an order by uid
///
/// Served from the cache when present, otherwise loaded from storage and
/// cached.
#[utoipa::path(
    get,
    path = "/api/order/{id}",
    tag = "Orders",
    params(
        ("id" = String, Path, description = "Order uid")
    ),
    responses(
        (status = 200, description = "Order found", body = Order),
        (status = 404, description = "Order not found", body = ApiError),
        (status = 500, description = "Storage failure", body = ApiError),
        (status = 503, description = "Storage unavailable", body = ApiError),
    ),
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = state.service.get_order_by_uid(&id).await?;
    Ok(Json(order))
}

/// GET /api/orders - List every stored order
#[utoipa::path(
    get,
    path = "/api/orders",
    tag = "Orders",
    responses(
        (status = 200, description = "All stored orders", body = Vec<Order>),
        (status = 500, description = "Storage failure", body = ApiError),
        (status = 503, description = "Storage unavailable", body = ApiError),
    ),
)]
pub async fn list_orders(State(state): State<AppState>) -> ApiResult<Json<Vec<Order>>> {
    let orders = state.service.get_all_orders().await?;
    Ok(Json(orders))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/order/:id", get(get_order))
        .route("/api/orders", get(list_orders))
}
