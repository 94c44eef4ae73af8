//! The classification oracle: five stage calls over one backend.
//!
//! Every stage shares the same shape. The input strings are wrapped as
//! `{"tags": [...]}` and sent as the user message with the stage prompt as
//! the system message; the answer must be a JSON array. Strictness is two
//! tiered: text that is not a JSON array fails the whole call, while array
//! elements with missing or mistyped fields decode with safe defaults and
//! elements that cannot be keyed at all are dropped (the assembler's
//! fallback paths then cover the omission).

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument, warn};

use tagnorm_core::{
    normalize_value, CanonicalAction, CanonicalTag, ClassifiedTag, DescriptorInfo,
    GenerationBackend, Result, SplitResult, SubgenreInfo, TagClass,
};

use crate::prompts::{Stage, StagePrompts};
use crate::response::parse_json_array;

type JsonObject = Map<String, JsonValue>;

/// Stage-aware client for the classification service.
#[derive(Clone)]
pub struct TagOracle {
    backend: Arc<dyn GenerationBackend>,
    prompts: StagePrompts,
}

impl TagOracle {
    pub fn new(backend: Arc<dyn GenerationBackend>, prompts: StagePrompts) -> Self {
        Self { backend, prompts }
    }

    /// Model recorded on every produced entry.
    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Probe the backend before a run.
    pub async fn health_check(&self) -> Result<bool> {
        self.backend.health_check().await
    }

    /// Resolve raw tags to their canonical spelling.
    pub async fn canonicalize(&self, tags: &[String]) -> Result<Vec<CanonicalTag>> {
        let items = self.call_stage(Stage::Canonicalize, tags).await?;
        Ok(decode_records(Stage::Canonicalize, items, decode_canonical))
    }

    /// Split canonical tags into independent semantic parts.
    pub async fn split(&self, canonicals: &[String]) -> Result<Vec<SplitResult>> {
        let items = self.call_stage(Stage::Split, canonicals).await?;
        Ok(decode_records(Stage::Split, items, decode_split))
    }

    /// Classify parts as genre, subgenre, mood, descriptor, invalid or other.
    pub async fn classify(&self, parts: &[String]) -> Result<Vec<ClassifiedTag>> {
        let items = self.call_stage(Stage::Classify, parts).await?;
        Ok(decode_records(Stage::Classify, items, decode_class))
    }

    /// Extract descriptors from parts.
    pub async fn extract_descriptors(&self, parts: &[String]) -> Result<Vec<DescriptorInfo>> {
        let items = self.call_stage(Stage::Descriptors, parts).await?;
        Ok(decode_records(Stage::Descriptors, items, decode_descriptors))
    }

    /// Resolve genre/subgenre parts to their parent genre.
    pub async fn map_subgenres(&self, parts: &[String]) -> Result<Vec<SubgenreInfo>> {
        let items = self.call_stage(Stage::Subgenre, parts).await?;
        Ok(decode_records(Stage::Subgenre, items, decode_subgenre))
    }

    #[instrument(skip(self, tags), fields(subsystem = "inference", component = "oracle", stage = stage.as_str(), input_count = tags.len()))]
    async fn call_stage(&self, stage: Stage, tags: &[String]) -> Result<Vec<JsonValue>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let payload = serde_json::to_string(&serde_json::json!({ "tags": tags }))?;
        let raw = self
            .backend
            .generate_with_system(self.prompts.get(stage), &payload)
            .await?;

        let items = parse_json_array(stage, &raw).map_err(|e| {
            warn!(stage = stage.as_str(), response_len = raw.len(), error = %e, "Malformed oracle response");
            e
        })?;

        debug!(
            stage = stage.as_str(),
            result_count = items.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Stage call complete"
        );
        Ok(items)
    }
}

/// Decode every array element, dropping the ones that cannot be keyed.
fn decode_records<T>(
    stage: Stage,
    items: Vec<JsonValue>,
    decode: fn(&JsonObject) -> Option<T>,
) -> Vec<T> {
    let total = items.len();
    let records: Vec<T> = items
        .iter()
        .filter_map(|item| item.as_object().and_then(decode))
        .collect();

    if records.len() < total {
        warn!(
            stage = stage.as_str(),
            skipped = total - records.len(),
            "Dropped oracle records without a usable source"
        );
    }
    records
}

fn string_field(obj: &JsonObject, key: &str) -> String {
    obj.get(key).map(normalize_value).unwrap_or_default()
}

/// Raw (unnormalized) text field, for free-form reasons.
fn text_field(obj: &JsonObject, key: &str) -> String {
    match obj.get(key) {
        Some(JsonValue::String(s)) => s.trim().to_string(),
        Some(JsonValue::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Normalized, non-empty, first-seen-order-deduplicated strings.
///
/// A bare string is accepted as a one-element list.
fn string_list_field(obj: &JsonObject, key: &str) -> Vec<String> {
    let values: Vec<String> = match obj.get(key) {
        Some(JsonValue::Array(items)) => items.iter().map(normalize_value).collect(),
        Some(JsonValue::String(s)) => vec![tagnorm_core::normalize(s)],
        _ => Vec::new(),
    };

    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !value.is_empty() && !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

fn bool_field(obj: &JsonObject, key: &str) -> bool {
    match obj.get(key) {
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
        _ => false,
    }
}

fn source_field(obj: &JsonObject) -> Option<String> {
    Some(string_field(obj, "source")).filter(|s| !s.is_empty())
}

fn decode_canonical(obj: &JsonObject) -> Option<CanonicalTag> {
    Some(CanonicalTag {
        source: source_field(obj)?,
        canonical: string_field(obj, "canonical"),
        action: CanonicalAction::parse_lenient(&string_field(obj, "action")),
        reason: text_field(obj, "reason"),
    })
}

fn decode_split(obj: &JsonObject) -> Option<SplitResult> {
    Some(SplitResult {
        source: source_field(obj)?,
        parts: string_list_field(obj, "parts"),
        reason: text_field(obj, "reason"),
    })
}

fn decode_class(obj: &JsonObject) -> Option<ClassifiedTag> {
    Some(ClassifiedTag {
        source: source_field(obj)?,
        class: TagClass::parse_lenient(&string_field(obj, "class")),
        reason: text_field(obj, "reason"),
    })
}

fn decode_descriptors(obj: &JsonObject) -> Option<DescriptorInfo> {
    Some(DescriptorInfo {
        source: source_field(obj)?,
        genre_like: string_field(obj, "genre_like"),
        descriptors: string_list_field(obj, "descriptors"),
        invalid_descriptors: string_list_field(obj, "invalid_descriptors"),
        reason: text_field(obj, "reason"),
    })
}

fn decode_subgenre(obj: &JsonObject) -> Option<SubgenreInfo> {
    Some(SubgenreInfo {
        source: source_field(obj)?,
        is_subgenre: bool_field(obj, "is_subgenre"),
        parent_genre: string_field(obj, "parent_genre"),
        reason: text_field(obj, "reason"),
    })
}
