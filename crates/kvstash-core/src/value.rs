//! Helpers for cached values.
//!
//! Cached values are arbitrary JSON documents ([`serde_json::Value`]).

use serde_json::Value;

/// Loose truthiness of a cached value.
///
/// `null`, `false`, `0`, `0.0`, `""`, `"0"`, `[]` and `{}` are falsy;
/// everything else is truthy. `pull` uses this to decide whether a value
/// "was found", so a stored `0` is pulled as `None` and left in place.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i != 0
            } else if let Some(u) = n.as_u64() {
                u != 0
            } else {
                n.as_f64().is_some_and(|f| f != 0.0)
            }
        }
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Interpret a cached value as an integer counter.
///
/// Integers and integer-valued strings are accepted (a counter written by
/// the remote store's INCRBY reads back as a JSON number anyway).
pub fn as_counter(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}
