//! Response-shape normalization for list endpoints.
//!
//! A list body may be a bare array, an object wrapping the array under the entity's
//! conventional field name, or anything else (empty, `null`, an unexpected object).
//! The result is always a `Vec`, never an absent value.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Locates the array inside `body`: a bare array first, then `body[field]`.
pub fn extract_array(body: Option<Value>, field: &str) -> Vec<Value> {
    match body {
        Some(Value::Array(items)) => items,
        Some(Value::Object(mut map)) => match map.remove(field) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Decodes each element as `T`. Elements that fail to decode are dropped with a
/// warning so one bad record does not hide the rest of the collection.
pub fn normalize_items<T: DeserializeOwned>(body: Option<Value>, field: &str) -> Vec<T> {
    let raw = extract_array(body, field);
    let total = raw.len();
    let items: Vec<T> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(idx, value)| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!(field, index = idx, error = %err, "dropping malformed record");
                None
            }
        })
        .collect();
    if items.len() != total {
        warn!(field, kept = items.len(), total, "list response contained malformed records");
    }
    items
}

/// Decodes the single object under `field`, or the body itself when it is not
/// wrapped. Used for endpoints answering `{portfolio: {...}}`.
pub fn normalize_object<T: DeserializeOwned>(body: Option<Value>, field: &str) -> Option<T> {
    let value = match body? {
        Value::Object(mut map) if map.contains_key(field) => map.remove(field)?,
        other => other,
    };
    match serde_json::from_value(value) {
        Ok(item) => Some(item),
        Err(err) => {
            warn!(field, error = %err, "malformed object in response");
            None
        }
    }
}
