//! Attribute storage for one record
//!
//! Holds the raw database value and the type-cast value of every attribute
//! the record currently has, plus the values as last read from the database
//! for change tracking. Absence of an entry means "not loaded"; whether that
//! matters is decided by the caller.

use sea_orm::{ColumnType, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
struct Attribute {
    raw: Value,
    value: Value,
}

#[derive(Debug, Clone, Default)]
pub struct AttributeSet {
    values: BTreeMap<String, Attribute>,
    original: BTreeMap<String, Value>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Type-cast value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).map(|a| &a.value)
    }

    /// Value exactly as the database returned it
    pub fn get_before_type_cast(&self, name: &str) -> Option<&Value> {
        self.values.get(name).map(|a| &a.raw)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Store a value read from the database. It becomes the baseline for
    /// change tracking.
    pub fn write_from_database(&mut self, name: &str, raw: Value, column_type: Option<&ColumnType>) {
        let value = match column_type {
            Some(ty) => cast(ty, &raw),
            None => raw.clone(),
        };
        self.original.insert(name.to_string(), value.clone());
        self.values.insert(name.to_string(), Attribute { raw, value });
    }

    /// Store a value assigned by the caller
    pub fn write(&mut self, name: &str, value: Value) {
        self.values.insert(
            name.to_string(),
            Attribute {
                raw: value.clone(),
                value,
            },
        );
    }

    /// Forget an attribute entirely, baseline included
    pub fn delete(&mut self, name: &str) -> Option<Value> {
        self.original.remove(name);
        self.values.remove(name).map(|a| a.value)
    }

    /// The value last read from the database, if the attribute was read at all
    pub fn original(&self, name: &str) -> Option<&Value> {
        self.original.get(name)
    }

    /// Whether the current value differs from the database baseline. A value
    /// written without a baseline counts as changed.
    pub fn changed(&self, name: &str) -> bool {
        match self.values.get(name) {
            Some(attr) => self.original.get(name) != Some(&attr.value),
            None => false,
        }
    }

    /// `(name, before, after)` for every changed attribute
    pub fn changes(&self) -> Vec<(String, Option<Value>, Value)> {
        self.values
            .iter()
            .filter(|(name, _)| self.changed(name))
            .map(|(name, attr)| (name.clone(), self.original.get(name).cloned(), attr.value.clone()))
            .collect()
    }

    /// Make the current values the new baseline, e.g. after a save
    pub fn clear_changes(&mut self) {
        self.original = self
            .values
            .iter()
            .map(|(name, attr)| (name.clone(), attr.value.clone()))
            .collect();
    }

    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.values
            .iter()
            .map(|(name, attr)| (name.clone(), attr.value.clone()))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .values
            .iter()
            .map(|(name, attr)| (name.clone(), value_to_json(&attr.value)))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl Serialize for AttributeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, attr) in &self.values {
            map.serialize_entry(name, &value_to_json(&attr.value))?;
        }
        map.end()
    }
}

/// Apply the column's logical type to a raw database value.
///
/// SQLite hands booleans back as integers and JSON as text; everything else
/// is already in its final shape.
pub fn cast(column_type: &ColumnType, raw: &Value) -> Value {
    match (column_type, raw) {
        (ColumnType::Boolean, Value::TinyInt(v)) => Value::Bool(v.map(|i| i != 0)),
        (ColumnType::Boolean, Value::SmallInt(v)) => Value::Bool(v.map(|i| i != 0)),
        (ColumnType::Boolean, Value::Int(v)) => Value::Bool(v.map(|i| i != 0)),
        (ColumnType::Boolean, Value::BigInt(v)) => Value::Bool(v.map(|i| i != 0)),
        (ColumnType::Json | ColumnType::JsonBinary, Value::String(Some(s))) => {
            match serde_json::from_str::<serde_json::Value>(s) {
                Ok(json) => Value::Json(Some(Box::new(json))),
                Err(_) => raw.clone(),
            }
        }
        (ColumnType::Json | ColumnType::JsonBinary, Value::String(None)) => Value::Json(None),
        _ => raw.clone(),
    }
}

pub fn value_to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Value::Bool(v) => v.map(Json::Bool).unwrap_or(Json::Null),
        Value::TinyInt(v) => v.map(Json::from).unwrap_or(Json::Null),
        Value::SmallInt(v) => v.map(Json::from).unwrap_or(Json::Null),
        Value::Int(v) => v.map(Json::from).unwrap_or(Json::Null),
        Value::BigInt(v) => v.map(Json::from).unwrap_or(Json::Null),
        Value::TinyUnsigned(v) => v.map(Json::from).unwrap_or(Json::Null),
        Value::SmallUnsigned(v) => v.map(Json::from).unwrap_or(Json::Null),
        Value::Unsigned(v) => v.map(Json::from).unwrap_or(Json::Null),
        Value::BigUnsigned(v) => v.map(Json::from).unwrap_or(Json::Null),
        Value::Float(v) => v.map(|f| Json::from(f64::from(f))).unwrap_or(Json::Null),
        Value::Double(v) => v.map(Json::from).unwrap_or(Json::Null),
        Value::String(v) => v
            .as_ref()
            .map(|s| Json::String((**s).clone()))
            .unwrap_or(Json::Null),
        Value::Char(v) => v.map(|c| Json::String(c.to_string())).unwrap_or(Json::Null),
        Value::Bytes(v) => match v {
            Some(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => Json::String(s.to_string()),
                Err(_) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
            },
            None => Json::Null,
        },
        Value::Json(v) => v.as_ref().map(|j| (**j).clone()).unwrap_or(Json::Null),
        Value::Uuid(v) => display(v),
        Value::Decimal(v) => display(v),
        Value::ChronoDate(v) => display(v),
        Value::ChronoTime(v) => display(v),
        Value::ChronoDateTime(v) => display(v),
        Value::ChronoDateTimeUtc(v) => display(v),
        Value::ChronoDateTimeLocal(v) => display(v),
        Value::ChronoDateTimeWithTimeZone(v) => display(v),
        other => Json::String(format!("{:?}", other)),
    }
}

fn display<T: std::fmt::Display>(value: &Option<Box<T>>) -> serde_json::Value {
    value
        .as_ref()
        .map(|v| serde_json::Value::String(v.to_string()))
        .unwrap_or(serde_json::Value::Null)
}
