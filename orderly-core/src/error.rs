//! Error types for Orderly operations

use std::fmt;
use thiserror::Error;

/// Which side of the order reconstruction join came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingJoin {
    Delivery,
    Payment,
}

impl fmt::Display for MissingJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingJoin::Delivery => write!(f, "delivery"),
            MissingJoin::Payment => write!(f, "payment"),
        }
    }
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Transaction failed at {step}: {reason}")]
    TransactionFailed { step: String, reason: String },

    #[error("Query failed for {operation}: {reason}")]
    QueryFailed { operation: String, reason: String },

    #[error("Order {order_uid} has no matching {missing} row")]
    JoinInconsistency {
        order_uid: String,
        missing: MissingJoin,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors for decoded order records.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },
}

/// Errors raised while turning raw message bytes into an [`crate::Order`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed order JSON at line {line}, column {column}: {reason}")]
    MalformedJson {
        line: usize,
        column: usize,
        reason: String,
    },
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::MalformedJson {
            line: err.line(),
            column: err.column(),
            reason: err.to_string(),
        }
    }
}

/// Master error type for all Orderly errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Order not found: {order_uid}")]
    NotFound { order_uid: String },
}

impl OrderError {
    /// Create a NotFound error for the given order identifier.
    pub fn not_found(order_uid: impl Into<String>) -> Self {
        OrderError::NotFound {
            order_uid: order_uid.into(),
        }
    }

    /// True when the order is absent from both cache and storage.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OrderError::NotFound { .. })
    }
}

/// Result type alias for Orderly operations.
pub type OrderResult<T> = Result<T, OrderError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_join_inconsistency() {
        let err = StorageError::JoinInconsistency {
            order_uid: "o1".to_string(),
            missing: MissingJoin::Payment,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("o1"));
        assert!(msg.contains("payment"));
    }

    #[test]
    fn test_storage_error_display_transaction_failed() {
        let err = StorageError::TransactionFailed {
            step: "insert delivery".to_string(),
            reason: "connection reset".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("insert delivery"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_decode_error_from_serde() {
        let err = serde_json::from_str::<serde_json::Value>("{\"order_uid\": ")
            .expect_err("truncated json must fail");
        let decode = DecodeError::from(err);
        let DecodeError::MalformedJson { line, .. } = decode.clone();
        assert_eq!(line, 1);
        assert!(format!("{}", decode).contains("Malformed order JSON"));
    }

    #[test]
    fn test_order_error_wraps_sources() {
        let err: OrderError = ValidationError::RequiredFieldMissing {
            field: "track_number".to_string(),
        }
        .into();
        assert!(matches!(err, OrderError::Validation(_)));
        assert!(format!("{}", err).contains("track_number"));

        let err: OrderError = StorageError::LockPoisoned.into();
        assert!(matches!(err, OrderError::Storage(StorageError::LockPoisoned)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_helper() {
        let err = OrderError::not_found("missing");
        assert!(err.is_not_found());
        assert_eq!(format!("{}", err), "Order not found: missing");
    }
}
