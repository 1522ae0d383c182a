use super::{DataType, DbError, EntityKey, Result, Value};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Conversion between a Rust field type and the tracked [`Value`] model.
///
/// Generated accessors use this to route typed reads and writes through a
/// `ChangeSet`. `None` on either side means "no value" (an empty slot).
pub trait TrackedValue: Clone + Send + Sync + 'static {
    fn data_type() -> DataType;

    fn nullable() -> bool {
        false
    }

    fn into_value(self) -> Option<Value>;

    fn from_value(value: Option<&Value>) -> Result<Self>;
}

fn mismatch(expected: DataType, got: Option<&Value>) -> DbError {
    match got {
        Some(value) => DbError::TypeMismatch(format!(
            "expected {}, got {}",
            expected,
            value.type_name()
        )),
        None => DbError::TypeMismatch(format!("expected {}, got no value", expected)),
    }
}

macro_rules! impl_tracked_value {
    ($ty:ty, $data_type:ident, $variant:ident) => {
        impl TrackedValue for $ty {
            fn data_type() -> DataType {
                DataType::$data_type
            }

            fn into_value(self) -> Option<Value> {
                Some(Value::$variant(self.into()))
            }

            fn from_value(value: Option<&Value>) -> Result<Self> {
                match value {
                    Some(Value::$variant(inner)) => Ok(inner.clone().try_into().map_err(|_| {
                        DbError::TypeMismatch(format!(
                            "{} value out of range for {}",
                            DataType::$data_type,
                            stringify!($ty)
                        ))
                    })?),
                    other => Err(mismatch(DataType::$data_type, other)),
                }
            }
        }
    };
}

impl_tracked_value!(i64, Integer, Integer);
impl_tracked_value!(i32, Integer, Integer);
impl_tracked_value!(String, Text, Text);
impl_tracked_value!(bool, Boolean, Boolean);
impl_tracked_value!(DateTime<Utc>, Timestamp, Timestamp);
impl_tracked_value!(Uuid, Uuid, Uuid);
impl_tracked_value!(serde_json::Value, Json, Json);
impl_tracked_value!(EntityKey, Reference, Reference);

impl TrackedValue for f64 {
    fn data_type() -> DataType {
        DataType::Float
    }

    fn into_value(self) -> Option<Value> {
        Some(Value::Float(self))
    }

    fn from_value(value: Option<&Value>) -> Result<Self> {
        match value {
            Some(Value::Float(f)) => Ok(*f),
            Some(Value::Integer(i)) => Ok(*i as f64),
            other => Err(mismatch(DataType::Float, other)),
        }
    }
}

/// An empty collection reads back from an empty slot.
impl TrackedValue for Vec<EntityKey> {
    fn data_type() -> DataType {
        DataType::ReferenceSet
    }

    fn nullable() -> bool {
        true
    }

    fn into_value(self) -> Option<Value> {
        Some(Value::References(self))
    }

    fn from_value(value: Option<&Value>) -> Result<Self> {
        match value {
            Some(Value::References(keys)) => Ok(keys.clone()),
            None => Ok(Vec::new()),
            other => Err(mismatch(DataType::ReferenceSet, other)),
        }
    }
}

impl<T: TrackedValue> TrackedValue for Option<T> {
    fn data_type() -> DataType {
        T::data_type()
    }

    fn nullable() -> bool {
        true
    }

    fn into_value(self) -> Option<Value> {
        self.and_then(T::into_value)
    }

    fn from_value(value: Option<&Value>) -> Result<Self> {
        match value {
            None => Ok(None),
            Some(_) => T::from_value(value).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_maps_to_empty() {
        assert_eq!(Option::<String>::None.into_value(), None);
        assert_eq!(Option::<String>::from_value(None).unwrap(), None);
        assert!(String::from_value(None).is_err());
    }

    #[test]
    fn test_narrowing_conversion_is_checked() {
        let big = Value::Integer(i64::MAX);
        assert!(i32::from_value(Some(&big)).is_err());
        assert_eq!(i32::from_value(Some(&Value::Integer(7))).unwrap(), 7);
    }

    #[test]
    fn test_empty_collection() {
        assert_eq!(Vec::<EntityKey>::from_value(None).unwrap(), Vec::new());
        assert!(Vec::<EntityKey>::from_value(Some(&Value::Integer(1))).is_err());
    }

    #[test]
    fn test_float_accepts_integer() {
        assert_eq!(f64::from_value(Some(&Value::Integer(2))).unwrap(), 2.0);
    }
}
