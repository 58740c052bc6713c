//! Lenient deserializers for log fields whose JSON type varies between dumps.

use serde::de::{Deserializer, Error};
use serde::Deserialize;
use serde_json::Value;

/// Accepts a string or a number, numbers are kept in their JSON rendering.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or number, found {}",
            other
        ))),
    }
}

/// Epoch milliseconds as an integer, a whole float, or a numeric string.
pub fn opt_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(ms) = n.as_i64() {
                return Ok(Some(ms));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
                _ => Err(D::Error::custom(format!(
                    "timestamp {} is not whole milliseconds",
                    n
                ))),
            }
        }
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid timestamp {:?}: {}", s, e))),
        Some(other) => Err(D::Error::custom(format!(
            "expected a millisecond timestamp, found {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "opt_millis")]
        ts: Option<i64>,
        #[serde(default, deserialize_with = "opt_string_or_number")]
        id: Option<String>,
    }

    fn probe(json: &str) -> Result<Probe, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[test]
    fn millis_variants() {
        assert_eq!(probe(r#"{"ts": 1542069000000}"#).unwrap().ts, Some(1542069000000));
        assert_eq!(probe(r#"{"ts": 1542069000000.0}"#).unwrap().ts, Some(1542069000000));
        assert_eq!(probe(r#"{"ts": "1542069000000"}"#).unwrap().ts, Some(1542069000000));
        assert_eq!(probe(r#"{"ts": null}"#).unwrap().ts, None);
        assert_eq!(probe(r#"{}"#).unwrap().ts, None);
        assert!(probe(r#"{"ts": 1.5}"#).is_err());
        assert!(probe(r#"{"ts": true}"#).is_err());
    }

    #[test]
    fn string_or_number_variants() {
        assert_eq!(probe(r#"{"id": "39"}"#).unwrap().id.as_deref(), Some("39"));
        assert_eq!(probe(r#"{"id": 39}"#).unwrap().id.as_deref(), Some("39"));
        assert_eq!(probe(r#"{"id": null}"#).unwrap().id, None);
        assert!(probe(r#"{"id": [1]}"#).is_err());
    }
}
