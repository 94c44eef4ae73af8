//! Cleaning and parsing of oracle response text.
//!
//! Models wrap JSON in code fences or surround it with prose often enough
//! that every stage runs its raw text through [`clean_response`] before
//! parsing. Anything that still is not a JSON array fails the stage call.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::debug;

use tagnorm_core::{Error, Result};

use crate::prompts::Stage;

/// Whole-text code fence with an optional language tag.
static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```$").expect("fence pattern is valid")
});

/// Strip a surrounding code fence and, when the text does not start with
/// JSON, cut it down to the span between the first `[` and the last `]`.
pub fn clean_response(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(inner) = FENCE.captures(text).and_then(|caps| caps.get(1)) {
        text = inner.as_str().trim();
    }

    if !text.starts_with('[') && !text.starts_with('{') {
        if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
            if start < end {
                return text[start..=end].to_string();
            }
        }
    }

    text.to_string()
}

/// Parse oracle text into the elements of a JSON array.
///
/// Fails with [`Error::MalformedResponse`] when the cleaned text is not JSON
/// or is JSON but not an array. Individual elements are not validated here.
pub fn parse_json_array(stage: Stage, raw: &str) -> Result<Vec<JsonValue>> {
    let cleaned = clean_response(raw);

    let value: JsonValue = serde_json::from_str(&cleaned).map_err(|e| {
        debug!(stage = stage.as_str(), error = %e, "Oracle response is not JSON");
        Error::malformed(stage.as_str(), raw)
    })?;

    match value {
        JsonValue::Array(items) => Ok(items),
        _ => Err(Error::malformed(stage.as_str(), raw)),
    }
}
