//! Conversion between [`Value`] and `serde_json::Value`.
//!
//! Hosts and definition files speak plain JSON; these helpers keep the mapping in one place
//! so every call-site (registry discovery, snapshots, tests) agrees on it.

use indexmap::IndexMap;
use serde_json::{Map, Number, Value as JsonValue};
use thiserror::Error;

use crate::Value;

#[derive(Debug, Error)]
pub enum JsonError {
    #[error("number {0} cannot be represented in JSON")]
    NonFiniteNumber(f64),
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Convert arbitrary JSON into a [`Value`]. Every JSON document has a representation.
pub fn from_json(value: JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(b),
        // u64/i64 beyond 2^53 lose precision here, matching JavaScript-side hosts
        JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
        JsonValue::String(s) => Value::Text(s),
        JsonValue::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        JsonValue::Object(obj) => Value::Map(
            obj.into_iter()
                .map(|(key, val)| (key, from_json(val)))
                .collect(),
        ),
    }
}

/// Convert a [`Value`] into JSON. Whole numbers are emitted as integers so saved files keep
/// `"joint_count": 3` rather than `3.0`.
pub fn to_json(value: &Value) -> Result<JsonValue, JsonError> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Number(n) => number_to_json(*n)?,
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::List(items) => JsonValue::Array(
            items
                .iter()
                .map(to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Map(map) => {
            let mut out = Map::new();
            for (key, val) in map {
                out.insert(key.clone(), to_json(val)?);
            }
            JsonValue::Object(out)
        }
    })
}

/// Convert a JSON object into an ordered attribute-value map.
pub fn map_from_json(value: JsonValue) -> Result<IndexMap<String, Value>, JsonError> {
    match value {
        JsonValue::Object(obj) => Ok(obj
            .into_iter()
            .map(|(key, val)| (key, from_json(val)))
            .collect()),
        JsonValue::Null => Err(JsonError::NotAnObject("null")),
        JsonValue::Bool(_) => Err(JsonError::NotAnObject("a boolean")),
        JsonValue::Number(_) => Err(JsonError::NotAnObject("a number")),
        JsonValue::String(_) => Err(JsonError::NotAnObject("a string")),
        JsonValue::Array(_) => Err(JsonError::NotAnObject("an array")),
    }
}

fn number_to_json(n: f64) -> Result<JsonValue, JsonError> {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Ok(JsonValue::Number(Number::from(n as i64)));
    }
    Number::from_f64(n)
        .map(JsonValue::Number)
        .ok_or(JsonError::NonFiniteNumber(n))
}
