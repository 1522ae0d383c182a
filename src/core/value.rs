use super::EntityKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A raw property value.
///
/// There is no `Null` variant: absence of a value is modelled by an empty
/// [`ValueSlot`](crate::tracking::ValueSlot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
    /// Single-valued relation (many-to-one, one-to-one).
    Reference(EntityKey),
    /// Collection-valued relation (one-to-many).
    References(Vec<EntityKey>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        self.data_type().name()
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Integer(_) => DataType::Integer,
            Self::Float(_) => DataType::Float,
            Self::Text(_) => DataType::Text,
            Self::Boolean(_) => DataType::Boolean,
            Self::Timestamp(_) => DataType::Timestamp,
            Self::Uuid(_) => DataType::Uuid,
            Self::Json(_) => DataType::Json,
            Self::Reference(_) => DataType::Reference,
            Self::References(_) => DataType::ReferenceSet,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<EntityKey> {
        match self {
            Self::Reference(key) => Some(*key),
            _ => None,
        }
    }

    pub fn as_references(&self) -> Option<&[EntityKey]> {
        match self {
            Self::References(keys) => Some(keys),
            _ => None,
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, Self::Reference(_) | Self::References(_))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                (a - b).abs() < f64::EPSILON
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Uuid(a), Self::Uuid(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Reference(a), Self::Reference(b)) => a == b,
            (Self::References(a), Self::References(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(fl) => write!(f, "{}", fl),
            Self::Text(s) => write!(f, "{}", s),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::Uuid(id) => write!(f, "{}", id),
            Self::Json(json) => write!(f, "{}", json),
            Self::Reference(key) => write!(f, "&{}", key),
            Self::References(keys) => write!(f, "[{} refs]", keys.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<EntityKey> for Value {
    fn from(key: EntityKey) -> Self {
        Self::Reference(key)
    }
}

/// Declared type of a tracked property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
    Uuid,
    Json,
    Reference,
    ReferenceSet,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Text => "TEXT",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
            Self::Uuid => "UUID",
            Self::Json => "JSON",
            Self::Reference => "REFERENCE",
            Self::ReferenceSet => "REFERENCE SET",
        }
    }

    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Float, Value::Integer(_)) => true,
            (expected, value) => *expected == value.data_type(),
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, Self::Reference | Self::ReferenceSet)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
