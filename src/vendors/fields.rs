//! Decoded field values produced by the drivers.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Field map keyed by field name. Ordered so summaries render stably.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A single decoded value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl FieldValue {
    /// Numeric view; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Inserts `value` under `key`.
pub fn put(fields: &mut FieldMap, key: &str, value: impl Into<FieldValue>) {
    fields.insert(key.to_string(), value.into());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(FieldValue::from(3.5).as_f64(), Some(3.5));
        assert_eq!(FieldValue::from(2i64).as_f64(), Some(2.0));
        assert_eq!(FieldValue::from("water").as_str(), Some("water"));
        assert_eq!(FieldValue::from(true).as_bool(), Some(true));
        assert_eq!(FieldValue::from("x").as_f64(), None);
    }

    #[test]
    fn test_serializes_untagged() {
        let mut fields = FieldMap::new();
        put(&mut fields, "meter", "hydrodigit");
        put(&mut fields, "total_m3", 3.866);
        put(&mut fields, "status_perm_alarm", true);
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(
            json,
            r#"{"meter":"hydrodigit","status_perm_alarm":true,"total_m3":3.866}"#
        );
    }
}
