use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use thiserror::Error;

//--------------------------------------        Order          ---------------------------------------------------------
/// An order as delivered by the upstream producer.
///
/// The serde field names are the wire names used on the queue and in the HTTP API, so an order that is decoded from a
/// message and encoded again produces the same JSON document.
///
/// Decoding is lenient in the way upstream producers expect: absent fields take their zero value and `"items": null`
/// is an empty list. Only `order_uid` is mandatory, and that is checked by [`Order::validate`].
///
/// `date_created` is held in UTC. A timestamp with another offset is accepted and normalised, so
/// `2021-11-26T06:22:19+03:00` is served back as `2021-11-26T03:22:19Z`. Orders read back from the store are UTC too,
/// so an order looks the same whether it was cached on ingestion or during warm-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    #[serde(deserialize_with = "null_as_empty")]
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

impl Order {
    /// Checks the parts of an order that JSON decoding alone cannot enforce.
    pub fn validate(&self) -> Result<(), OrderValidationError> {
        if self.order_uid.trim().is_empty() {
            return Err(OrderValidationError::MissingOrderUid);
        }
        if self.order_uid.chars().any(char::is_control) {
            return Err(OrderValidationError::InvalidOrderUid(self.order_uid.escape_debug().to_string()));
        }
        Ok(())
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] track: {} items: {}", self.order_uid, self.track_number, self.items.len())
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderValidationError {
    #[error("The order has no order_uid")]
    MissingOrderUid,
    #[error("The order_uid contains control characters: {0}")]
    InvalidOrderUid(String),
}

//--------------------------------------       Delivery        ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct Payment {
    #[sqlx(rename = "transaction_id")]
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    /// Unix timestamp (seconds) of the payment
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

//--------------------------------------         Item          ---------------------------------------------------------
/// A line item. Items have no identity outside the order that contains them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i64,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i64,
}

//--------------------------------------   InsertOrderResult   ---------------------------------------------------------
/// The effect of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOrderResult {
    /// The order and all of its sub-records were written.
    Inserted,
    /// An order with the same `order_uid` was already stored. Nothing was written.
    AlreadyExists,
}

impl InsertOrderResult {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

impl Display for InsertOrderResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inserted => write!(f, "Inserted"),
            Self::AlreadyExists => write!(f, "AlreadyExists"),
        }
    }
}
