use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::errors::DomainError;

/// Field names used when addressing order records in the remote store
pub mod fields {
    pub const ID: &str = "id";
    pub const DATE: &str = "date";
    pub const STATUS: &str = "status";
    pub const TOTAL: &str = "total";

    /// Spanish spellings some writers use for the same fields
    pub const DATE_ALIAS: &str = "fecha";
    pub const STATUS_ALIAS: &str = "estado";
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fulfilment status of an order.
///
/// The remote store carries status as free text; the three known values map
/// onto variants and anything else is kept verbatim in `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Preparing,
    Shipping,
    Delivered,
    Unknown(String),
}

impl OrderStatus {
    pub const PREPARING: &'static str = "En preparación";
    pub const SHIPPING: &'static str = "En despacho";
    pub const DELIVERED: &'static str = "Entregado";

    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Preparing => Self::PREPARING,
            OrderStatus::Shipping => Self::SHIPPING,
            OrderStatus::Delivered => Self::DELIVERED,
            OrderStatus::Unknown(raw) => raw,
        }
    }

    /// Next status in the fulfilment cycle. Delivered and unrecognised
    /// statuses wrap back to `Preparing`.
    pub fn next(&self) -> OrderStatus {
        match self {
            OrderStatus::Preparing => OrderStatus::Shipping,
            OrderStatus::Shipping => OrderStatus::Delivered,
            OrderStatus::Delivered | OrderStatus::Unknown(_) => OrderStatus::Preparing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Unknown(String::new())
    }
}

impl From<&str> for OrderStatus {
    fn from(raw: &str) -> Self {
        match raw {
            Self::PREPARING => OrderStatus::Preparing,
            Self::SHIPPING => OrderStatus::Shipping,
            Self::DELIVERED => OrderStatus::Delivered,
            other => OrderStatus::Unknown(other.to_string()),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            Self::PREPARING => OrderStatus::Preparing,
            Self::SHIPPING => OrderStatus::Shipping,
            Self::DELIVERED => OrderStatus::Delivered,
            _ => OrderStatus::Unknown(raw),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order record as held in the `pedidos` collection.
///
/// `date` and `total` are display strings and are never parsed. Missing
/// or null fields decode as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, alias = "fecha", deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, alias = "estado", deserialize_with = "null_as_default")]
    pub status: OrderStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: String,
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        date: impl Into<String>,
        status: impl Into<OrderStatus>,
        total: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date: date.into(),
            status: status.into(),
            total: total.into(),
        }
    }

    /// Decode an order from a raw store record.
    ///
    /// Each field is read as text; a missing, null or non-text value becomes
    /// an empty string. The English field name wins when a record carries
    /// both spellings.
    pub fn from_record(record: Value) -> Result<Self, DomainError> {
        let Value::Object(map) = record else {
            return Err(DomainError::InvalidRecord(format!(
                "expected an object, got {}",
                record
            )));
        };

        let text = |keys: &[&str]| -> String {
            keys.iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            id: text(&[fields::ID]),
            date: text(&[fields::DATE, fields::DATE_ALIAS]),
            status: OrderStatus::from(text(&[fields::STATUS, fields::STATUS_ALIAS])),
            total: text(&[fields::TOTAL]),
        })
    }

    /// Read a field by its store name
    pub fn field(&self, name: &str) -> Result<&str, DomainError> {
        match name {
            fields::ID => Ok(&self.id),
            fields::DATE => Ok(&self.date),
            fields::STATUS => Ok(self.status.as_str()),
            fields::TOTAL => Ok(&self.total),
            other => Err(DomainError::UnknownField(other.to_string())),
        }
    }

    /// Overwrite a field by its store name
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<(), DomainError> {
        match name {
            fields::ID => self.id = value.to_string(),
            fields::DATE => self.date = value.to_string(),
            fields::STATUS => self.status = OrderStatus::from(value),
            fields::TOTAL => self.total = value.to_string(),
            other => return Err(DomainError::UnknownField(other.to_string())),
        }
        Ok(())
    }
}
