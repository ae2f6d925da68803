//! Order record and its delivery, payment and item sub-records.
//!
//! Field names match the JSON published on the order bus. Every struct
//! decodes with `#[serde(default)]` and every field with
//! `null_as_default`: a missing or `null` field becomes its zero value
//! and only [`Order::validate`] decides whether a record is acceptable.
//! Publishers that marshal empty slices as `null` are therefore accepted.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DecodeError, ValidationError};

/// Postgres `TIMESTAMPTZ` precision, in fractional-second digits.
const TIMESTAMP_PRECISION_DIGITS: u16 = 6;

/// Decode a field, mapping an explicit JSON `null` to the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Canonical order record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct Order {
    /// Unique order identifier
    #[serde(deserialize_with = "null_as_default")]
    pub order_uid: String,
    /// Track number shared by the order and its items
    #[serde(deserialize_with = "null_as_default")]
    pub track_number: String,
    /// Entry channel
    #[serde(deserialize_with = "null_as_default")]
    pub entry: String,
    #[serde(deserialize_with = "null_as_default")]
    pub delivery: Delivery,
    #[serde(deserialize_with = "null_as_default")]
    pub payment: Payment,
    #[serde(deserialize_with = "null_as_default")]
    pub items: Vec<Item>,
    #[serde(deserialize_with = "null_as_default")]
    pub locale: String,
    #[serde(deserialize_with = "null_as_default")]
    pub internal_signature: String,
    #[serde(deserialize_with = "null_as_default")]
    pub customer_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub delivery_service: String,
    #[serde(deserialize_with = "null_as_default")]
    pub shardkey: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sm_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub date_created: DateTime<Utc>,
    #[serde(deserialize_with = "null_as_default")]
    pub oof_shard: String,
}

/// Delivery recipient details. One per order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct Delivery {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub zip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(deserialize_with = "null_as_default")]
    pub region: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
}

/// Payment details, keyed by transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct Payment {
    #[serde(deserialize_with = "null_as_default")]
    pub transaction: String,
    #[serde(deserialize_with = "null_as_default")]
    pub request_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub currency: String,
    #[serde(deserialize_with = "null_as_default")]
    pub provider: String,
    #[serde(deserialize_with = "null_as_default")]
    pub amount: i64,
    /// Payment time as unix seconds
    #[serde(deserialize_with = "null_as_default")]
    pub payment_dt: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub bank: String,
    #[serde(deserialize_with = "null_as_default")]
    pub delivery_cost: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub goods_total: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub custom_fee: i64,
}

/// A single line item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct Item {
    #[serde(deserialize_with = "null_as_default")]
    pub chrt_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub track_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub price: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub rid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sale: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub size: String,
    #[serde(deserialize_with = "null_as_default")]
    pub total_price: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub nm_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub brand: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: i64,
}

/// Identity of an item row: `chrt_id` scoped to the item's track number.
///
/// Replaying an order never inserts a second row with the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub track_number: String,
    pub chrt_id: i64,
}

impl Item {
    pub fn key(&self) -> ItemKey {
        ItemKey {
            track_number: self.track_number.clone(),
            chrt_id: self.chrt_id,
        }
    }
}

impl Order {
    /// Decode an order from raw message bytes.
    ///
    /// `date_created` is truncated to microseconds, the precision storage
    /// keeps, so a cached copy never differs from the stored one.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut order: Order = serde_json::from_slice(bytes)?;
        order.date_created = order.date_created.trunc_subsecs(TIMESTAMP_PRECISION_DIGITS);
        Ok(order)
    }

    /// Check the fields every accepted order must carry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.order_uid.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "order_uid".to_string(),
            });
        }
        if self.track_number.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "track_number".to_string(),
            });
        }
        Ok(())
    }
}
