//! Guarded JSON encode/decode
//!
//! Decoding that can fail stays crate-private. The public helpers log and
//! fall back so that corrupt persisted data never reaches the host as an
//! error.

use crate::core::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Decode a value, propagating the serde error
pub(crate) fn decode<T: DeserializeOwned>(value: &Value) -> Result<T> {
    Ok(serde_json::from_value(value.clone())?)
}

/// Decode a value, or build a replacement when it does not conform
pub fn decode_or_else<T, F>(value: &Value, what: &str, fallback: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match decode(value) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!("Discarding malformed {} data: {}", what, e);
            fallback()
        }
    }
}

/// Decode a JSON string, or build a replacement when it does not parse
pub fn decode_str_or_else<T, F>(json: &str, what: &str, fallback: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match serde_json::from_str::<Value>(json) {
        Ok(value) => decode_or_else(&value, what, fallback),
        Err(e) => {
            tracing::warn!("Discarding unparseable {} JSON: {}", what, e);
            fallback()
        }
    }
}

/// Encode to a JSON value
///
/// Encoding our own types cannot fail in practice; if it ever does the
/// failure is logged and `Value::Null` is returned.
pub fn encode<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::error!("Failed to encode value: {}", e);
        Value::Null
    })
}
