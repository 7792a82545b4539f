//! Lossy size reduction for JSON values written under quota pressure.
//!
//! # Invariants
//! - Only the serialized copy is compressed; in-memory state never is.
//! - Compressing an already compressed value changes nothing.

use serde_json::{Map, Value};

/// Strings longer than this many characters are truncated.
pub const TRUNCATE_THRESHOLD_CHARS: usize = 10_000;
/// Characters kept from a truncated string.
pub const TRUNCATED_LENGTH_CHARS: usize = 1_000;
/// Appended to every truncated string.
pub const TRUNCATION_MARKER: &str = "...";

/// Recursively drops null object fields and truncates oversized strings.
///
/// Arrays keep their length (null elements included); other scalars pass
/// through unchanged.
pub fn compress(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(compress).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(_, field)| !field.is_null())
                .map(|(name, field)| (name.clone(), compress(field)))
                .collect::<Map<String, Value>>(),
        ),
        Value::String(text) => Value::String(truncate_oversized(text)),
        scalar => scalar.clone(),
    }
}

fn truncate_oversized(text: &str) -> String {
    if text.chars().count() <= TRUNCATE_THRESHOLD_CHARS {
        return text.to_string();
    }
    let mut truncated = text
        .chars()
        .take(TRUNCATED_LENGTH_CHARS)
        .collect::<String>();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
