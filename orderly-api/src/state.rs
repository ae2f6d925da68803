//! Shared application state for Axum routers.

use std::time::Instant;

use orderly_storage::OrderService;

/// Application-wide state shared across all routes.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Coordinator for cache-aside reads and readiness probes.
    pub service: OrderService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: OrderService) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}
