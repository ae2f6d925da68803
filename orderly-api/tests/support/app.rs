use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use orderly_api::{create_router, ApiConfig, AppState};
use orderly_storage::{MemoryCache, OrderRepository, OrderService};
use tower::ServiceExt;

/// Router over the given repository with a fresh cache.
pub fn test_app<R>(repository: Arc<R>) -> (Router, OrderService)
where
    R: OrderRepository + 'static,
{
    let service = OrderService::new(repository, Arc::new(MemoryCache::new()));
    let router = create_router(AppState::new(service.clone()), &ApiConfig::default());
    (router, service)
}

/// Issue a GET and return status plus raw body.
pub async fn get_raw(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    let response = app.clone().oneshot(request).await.expect("infallible router");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    (status, body.to_vec())
}

/// Issue a GET and decode the body as JSON.
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = get_raw(app, uri).await;
    let json = serde_json::from_slice(&body).expect("JSON body");
    (status, json)
}
