// Lenient decoding for optional fields
// Malformed input falls back to a default instead of failing the record.
// Callers get the fallback flag so a strict mode can reject it later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// A decoded value plus whether it had to be defaulted
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub defaulted: bool,
}

impl<T> Decoded<T> {
    fn exact(value: T) -> Self {
        Self {
            value,
            defaulted: false,
        }
    }

    fn fallback(value: T) -> Self {
        Self {
            value,
            defaulted: true,
        }
    }
}

/// Decode a JSON array of strings stored as text
/// Anything else (malformed JSON, `null`, an object) decodes to an empty list
pub fn decode_string_list(text: &str) -> Decoded<Vec<String>> {
    match serde_json::from_str::<Vec<String>>(text) {
        Ok(list) => Decoded::exact(list),
        Err(e) => {
            log::warn!("[lenient] Unreadable string list {:?}: {}", text, e);
            Decoded::fallback(Vec::new())
        }
    }
}

/// Encode a string list as JSON text; an empty list is always `[]`
pub fn encode_string_list(list: &[String]) -> String {
    serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
}

/// Parse an RFC 3339 timestamp
/// Empty or malformed input yields `None`, the zero value
pub fn parse_timestamp(text: &str) -> Decoded<Option<DateTime<Utc>>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Decoded::fallback(None);
    }

    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(value) => Decoded::exact(Some(value.with_timezone(&Utc))),
        Err(_) => Decoded::fallback(None),
    }
}

/// Serde helper: an explicit `null` decodes like a missing key
/// Pair with `#[serde(default)]` so absent keys are covered too.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
