//! Value: the closed set of data an attribute can hold.
//!
//! Values are deliberately JSON-shaped so saved stacks stay readable and so address
//! detection can be exhaustive over the variants.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Lightweight kind enum for dispatch and diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    Text,
    List,
    Map,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// Absent / unset
    #[default]
    Null,

    Bool(bool),

    /// All numbers are stored as f64; integers round-trip exactly up to 2^53.
    Number(f64),

    /// Text, which may also carry an address into another component
    Text(String),

    List(Vec<Value>),

    /// String-keyed mapping, insertion ordered
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Return the coarse kind of this value.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
        }
    }

    /// True for null, the empty string, the empty list and the empty map.
    ///
    /// Numbers and booleans are never empty: `0` and `false` are deliberate values.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Integer view of a number; `None` when the number has a fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Convenience constructor for text values.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emptiness_matches_requirement_semantics() {
        assert!(Value::Null.is_empty());
        assert!(Value::text("").is_empty());
        assert!(Value::List(vec![]).is_empty());
        assert!(Value::Map(IndexMap::new()).is_empty());

        assert!(!Value::from(0).is_empty());
        assert!(!Value::from(false).is_empty());
        assert!(!Value::text("joint").is_empty());
        assert!(!Value::List(vec![Value::Null]).is_empty());
    }

    #[test]
    fn untagged_json_reads_naturally() {
        let v: Value = serde_json::from_str(r#"{"count": 3, "names": ["a", "b"], "on": true, "x": null}"#)
            .expect("parse value");
        let map = v.as_map().expect("map");
        assert_eq!(map.get("count").and_then(Value::as_i64), Some(3));
        assert_eq!(
            map.get("names").and_then(Value::as_list).map(|l| l.len()),
            Some(2)
        );
        assert_eq!(map.get("on").and_then(Value::as_bool), Some(true));
        assert!(map.get("x").map(Value::is_null).unwrap_or(false));
        // insertion order survives
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["count", "names", "on", "x"]);
    }

    #[test]
    fn fractional_numbers_are_not_integers() {
        assert_eq!(Value::from(2.5).as_i64(), None);
        assert_eq!(Value::from(2.0).as_i64(), Some(2));
    }
}
