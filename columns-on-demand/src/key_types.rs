//! Primary key values
//!
//! Lazy fetches filter on the primary key of the row they belong to. The key
//! is kept as a small enum so records of any key type can share one fetch
//! path.

use sea_orm::Value;
use std::fmt;
use uuid::Uuid;

/// A primary key value read from a record's attributes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Int(i64),
    String(String),
    Uuid(Uuid),
}

impl RecordKey {
    /// Convert to a sea_orm::Value for binding into a statement
    pub fn to_db_value(&self) -> Value {
        match self {
            Self::Int(value) => Value::BigInt(Some(*value)),
            Self::String(value) => Value::String(Some(Box::new(value.clone()))),
            Self::Uuid(value) => Value::Uuid(Some(Box::new(*value))),
        }
    }

    /// Read a key out of a stored value. NULL and non-key types yield `None`.
    pub fn from_db_value(value: &Value) -> Option<Self> {
        match value {
            Value::TinyInt(Some(i)) => Some(Self::Int(i64::from(*i))),
            Value::SmallInt(Some(i)) => Some(Self::Int(i64::from(*i))),
            Value::Int(Some(i)) => Some(Self::Int(i64::from(*i))),
            Value::BigInt(Some(i)) => Some(Self::Int(*i)),
            Value::TinyUnsigned(Some(i)) => Some(Self::Int(i64::from(*i))),
            Value::SmallUnsigned(Some(i)) => Some(Self::Int(i64::from(*i))),
            Value::Unsigned(Some(i)) => Some(Self::Int(i64::from(*i))),
            Value::BigUnsigned(Some(i)) => i64::try_from(*i).ok().map(Self::Int),
            Value::String(Some(s)) => Some(Self::String((**s).clone())),
            Value::Uuid(Some(uuid)) => Some(Self::Uuid(**uuid)),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::String(value) => write!(f, "{}", value),
            Self::Uuid(value) => write!(f, "{}", value),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for RecordKey {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Uuid> for RecordKey {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widths_collapse_to_int() {
        assert_eq!(RecordKey::from_db_value(&Value::Int(Some(3))), Some(RecordKey::Int(3)));
        assert_eq!(RecordKey::from_db_value(&Value::BigInt(Some(3))), Some(RecordKey::Int(3)));
        assert_eq!(RecordKey::from_db_value(&Value::Int(None)), None);
    }

    #[test]
    fn string_keys_stay_strings() {
        let key = RecordKey::from_db_value(&Value::String(Some(Box::new("abc".into()))));
        assert_eq!(key, Some(RecordKey::String("abc".into())));
        assert_eq!(key.unwrap().to_string(), "abc");
    }
}
