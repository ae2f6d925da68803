//! In-process order cache.
//!
//! The cache holds value snapshots of orders keyed by `order_uid`. It has
//! no eviction and lives for the lifetime of the process. Consistency with
//! durable state is the coordinator's job: an order is only cached after
//! it is durable, or after it was read back from storage.

pub mod memory;
pub mod traits;

pub use memory::MemoryCache;
pub use traits::{CacheStats, OrderCache};
