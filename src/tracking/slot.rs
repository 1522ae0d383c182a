use crate::core::{DataType, Value};
use serde::{Deserialize, Serialize};

/// Immutable tri-state holder: no value, or a value with its declared type.
///
/// All empty slots compare equal regardless of declared type. "Changing" a
/// slot means replacing it inside a [`ChangeEntry`](super::ChangeEntry).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueSlot {
    value: Option<Value>,
    declared_type: Option<DataType>,
}

impl ValueSlot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn empty_of(declared_type: DataType) -> Self {
        Self {
            value: None,
            declared_type: Some(declared_type),
        }
    }

    /// Wraps a value, taking the declared type from the value itself.
    pub fn of(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            declared_type: Some(value.data_type()),
            value: Some(value),
        }
    }

    pub fn typed(value: Option<Value>, declared_type: DataType) -> Self {
        Self {
            value,
            declared_type: Some(declared_type),
        }
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn declared_type(&self) -> Option<DataType> {
        self.declared_type
    }

    pub fn into_value(self) -> Option<Value> {
        self.value
    }
}

impl PartialEq for ValueSlot {
    fn eq(&self, other: &Self) -> bool {
        match (&self.value, &other.value) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b && self.declared_type == other.declared_type,
            _ => false,
        }
    }
}

impl Eq for ValueSlot {}

impl From<Value> for ValueSlot {
    fn from(value: Value) -> Self {
        Self::of(value)
    }
}

impl From<Option<Value>> for ValueSlot {
    fn from(value: Option<Value>) -> Self {
        match value {
            Some(value) => Self::of(value),
            None => Self::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slots_equal_regardless_of_type() {
        assert_eq!(ValueSlot::empty(), ValueSlot::empty_of(DataType::Text));
        assert_eq!(
            ValueSlot::empty_of(DataType::Integer),
            ValueSlot::empty_of(DataType::Text)
        );
        assert_ne!(ValueSlot::empty(), ValueSlot::of(1));
    }

    #[test]
    fn test_value_slots_compare_structurally() {
        assert_eq!(ValueSlot::of("Alice"), ValueSlot::of("Alice"));
        assert_ne!(ValueSlot::of("Alice"), ValueSlot::of("Bob"));
        assert_ne!(
            ValueSlot::typed(Some(Value::Integer(1)), DataType::Integer),
            ValueSlot::typed(Some(Value::Integer(1)), DataType::Float)
        );
    }
}
