//! Orderly Core - Order Record Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! the canonical [`Order`] record with its delivery, payment and item
//! sub-records, plus the error taxonomy used across ingestion, storage
//! and serving.
//!
//! This crate contains no I/O.

pub mod error;
pub mod order;

pub use error::{DecodeError, MissingJoin, OrderError, OrderResult, StorageError, ValidationError};
pub use order::{Delivery, Item, ItemKey, Order, Payment};

