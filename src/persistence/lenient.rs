//! Field deserializers that never fail
//!
//! Persisted records go through these so that one malformed field falls back
//! to its default instead of rejecting the whole record. Each helper yields
//! `None` (or an empty list) for anything it cannot make sense of.

use crate::core::numeric::value_to_number;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Finite number, or a numeric string
pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_number(&value))
}

/// Integer-valued number (fractional part floored)
pub fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number(deserializer)?.map(|n| n.floor().clamp(i64::MIN as f64, i64::MAX as f64) as i64))
}

/// String; numbers and booleans are rendered as text
pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Boolean; also accepts `"true"`/`"false"` and numbers (non-zero is true)
pub fn boolean<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        _ => None,
    })
}

/// Any deserializable value; `None` if it does not fit `T`
pub fn parsed<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// List whose malformed entries are dropped individually
pub fn items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(entries) = value else {
        return Ok(Vec::new());
    };

    let total = entries.len();
    let kept: Vec<T> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();

    if kept.len() < total {
        tracing::warn!("Dropped {} malformed entries while loading", total - kept.len());
    }

    Ok(kept)
}

/// JSON object; anything else becomes an empty map
pub fn object<'de, D>(deserializer: D) -> Result<serde_json::Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Probe {
        #[serde(deserialize_with = "number")]
        value: Option<f64>,
        #[serde(deserialize_with = "integer")]
        count: Option<i64>,
        #[serde(deserialize_with = "string")]
        label: Option<String>,
        #[serde(deserialize_with = "boolean")]
        flag: Option<bool>,
        #[serde(deserialize_with = "items")]
        list: Vec<u32>,
    }

    #[test]
    fn test_malformed_fields_become_none() {
        let probe: Probe = serde_json::from_value(json!({
            "value": "not a number",
            "count": [1, 2],
            "label": null,
            "flag": "maybe",
            "list": "nope"
        }))
        .unwrap();

        assert_eq!(probe.value, None);
        assert_eq!(probe.count, None);
        assert_eq!(probe.label, None);
        assert_eq!(probe.flag, None);
        assert!(probe.list.is_empty());
    }

    #[test]
    fn test_coercions() {
        let probe: Probe = serde_json::from_value(json!({
            "value": "12.5",
            "count": 3.7,
            "label": 42,
            "flag": 1,
            "list": [1, "x", 3]
        }))
        .unwrap();

        assert_eq!(probe.value, Some(12.5));
        assert_eq!(probe.count, Some(3));
        assert_eq!(probe.label.as_deref(), Some("42"));
        assert_eq!(probe.flag, Some(true));
        assert_eq!(probe.list, vec![1, 3]);
    }

    #[test]
    fn test_missing_fields_use_default() {
        let probe: Probe = serde_json::from_value(json!({})).unwrap();
        assert_eq!(probe.value, None);
        assert!(probe.list.is_empty());
    }
}
