//! Structured value model and marshalling.
//!
//! [`Value`] is the host-visible representation of structured data moving
//! across the transport boundary: request options on the way out,
//! completion results on the way in. Completion results are moved into the
//! callback without copying; the coordinator never retains them.
//!
//! Marshalling to and from `serde_json::Value` is provided for hosts that
//! want a JSON view of results or build request options from JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A structured value crossing the transport boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent / null.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Signed integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// Text scalar.
    Str(String),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// Named fields, ordered by name.
    Struct(BTreeMap<String, Value>),
}

impl Value {
    /// An empty structure, the default request options.
    pub fn empty_struct() -> Self {
        Value::Struct(BTreeMap::new())
    }

    /// Build a structure from field name/value pairs.
    pub fn structure<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        Value::Struct(fields.into_iter().collect())
    }

    /// Whether this value is a structure.
    pub fn is_struct(&self) -> bool {
        matches!(self, Value::Struct(_))
    }

    /// Look up a field of a structure; `None` for other shapes.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.get(name),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Struct(
                fields
                    .into_iter()
                    .map(|(name, v)| (name, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Value::from(f),
            Value::Str(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Struct(fields) => serde_json::Value::Object(
                fields
                    .into_iter()
                    .map(|(name, v)| (name, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_field_lookup() {
        let v = Value::structure([
            ("value".to_string(), Value::from(42)),
            ("alarm".to_string(), Value::empty_struct()),
        ]);
        assert!(v.is_struct());
        assert_eq!(v.field("value"), Some(&Value::Int(42)));
        assert_eq!(v.field("missing"), None);
        assert_eq!(Value::from(1).field("value"), None);
    }

    #[test]
    fn json_round_trip() {
        let json: serde_json::Value = serde_json::json!({
            "field": ["value", "alarm"],
            "record": { "queueSize": 4, "pipeline": true },
        });
        let value = Value::from(json.clone());
        assert_eq!(
            value.field("record").and_then(|r| r.field("queueSize")),
            Some(&Value::Int(4))
        );
        assert_eq!(serde_json::Value::from(value), json);
    }

    #[test]
    fn large_unsigned_falls_back_to_float() {
        let json = serde_json::json!(u64::MAX);
        assert!(matches!(Value::from(json), Value::Float(_)));
    }
}
