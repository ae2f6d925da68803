//! Orderly Storage - Persistence, Cache and Coordinator
//!
//! Defines the two capabilities the order service is built on and the
//! coordinator that keeps them consistent:
//!
//! - [`OrderRepository`]: durable, transactional persistence of orders
//!   across their normalized tables. The Postgres implementation lives in
//!   orderly-api; [`InMemoryOrderRepository`] mirrors its contract for tests
//!   and local runs.
//! - [`OrderCache`]: concurrent in-process map from order id to the last
//!   known record.
//! - [`OrderService`]: write-through on create, read-through on lookup,
//!   and the startup restore pass.

pub mod cache;
pub mod coordinator;
pub mod repository;

pub use cache::{CacheStats, MemoryCache, OrderCache};
pub use coordinator::OrderService;
pub use repository::{InMemoryOrderRepository, OrderRepository};
