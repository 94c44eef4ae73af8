//! Universal tag string normalization.
//!
//! Every map key in the pipeline is a normalized string: raw tags before the
//! blacklist lookup, every string field the oracle emits, and blacklist
//! entries at load time.

use serde_json::Value as JsonValue;

/// Lowercase, trim, and collapse internal whitespace runs to a single space.
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize an arbitrary JSON value, stringifying non-string scalars.
///
/// `null` normalizes to the empty string. Arrays and objects are rendered as
/// compact JSON before normalization.
pub fn normalize_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => normalize(s),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        other => normalize(&other.to_string()),
    }
}
