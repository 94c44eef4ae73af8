//! Data model for the tag normalization pipeline.
//!
//! Stage records are produced by the classification oracle and are immutable
//! once decoded. Every string field except [`TagMapEntry::source`] (the raw
//! tag as it appeared in metadata) is already normalized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// STAGE ENUMS
// =============================================================================

/// How the canonicalizer arrived at the canonical form of a raw tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalAction {
    #[default]
    Identity,
    AbbreviationToFull,
    AliasToCanonical,
    SpellfixToCanonical,
}

impl CanonicalAction {
    /// Parse an oracle-supplied action, falling back to `Identity`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "abbreviation_to_full" => Self::AbbreviationToFull,
            "alias_to_canonical" => Self::AliasToCanonical,
            "spellfix_to_canonical" => Self::SpellfixToCanonical,
            _ => Self::Identity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::AbbreviationToFull => "abbreviation_to_full",
            Self::AliasToCanonical => "alias_to_canonical",
            Self::SpellfixToCanonical => "spellfix_to_canonical",
        }
    }
}

impl fmt::Display for CanonicalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Semantic class assigned to a split part by the classifier stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagClass {
    Genre,
    Subgenre,
    Mood,
    Descriptor,
    Invalid,
    #[default]
    Other,
}

impl TagClass {
    /// Parse an oracle-supplied class, falling back to `Other`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "genre" => Self::Genre,
            "subgenre" => Self::Subgenre,
            "mood" => Self::Mood,
            "descriptor" => Self::Descriptor,
            "invalid" => Self::Invalid,
            _ => Self::Other,
        }
    }

    /// Genre-like classes are routed to the subgenre stage.
    pub fn is_genre_like(&self) -> bool {
        matches!(self, Self::Genre | Self::Subgenre)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Genre => "genre",
            Self::Subgenre => "subgenre",
            Self::Mood => "mood",
            Self::Descriptor => "descriptor",
            Self::Invalid => "invalid",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TagClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type label attached to each final normalized tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagType {
    Genre,
    Subgenre,
    Mood,
    Descriptor,
    #[default]
    Other,
}

impl TagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Genre => "genre",
            Self::Subgenre => "subgenre",
            Self::Mood => "mood",
            Self::Descriptor => "descriptor",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// STAGE RECORDS
// =============================================================================

/// Canonicalizer output for one raw tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTag {
    /// The raw tag. Oracle replies carry its normalized form until the
    /// entry is assembled.
    pub source: String,
    pub canonical: String,
    #[serde(default)]
    pub action: CanonicalAction,
    #[serde(default)]
    pub reason: String,
}

impl CanonicalTag {
    /// Identity canonicalization used when the oracle omitted the tag.
    pub fn fallback(raw: &str) -> Self {
        Self {
            source: raw.to_string(),
            canonical: crate::normalize(raw),
            action: CanonicalAction::Identity,
            reason: "fallback: no canonical record returned".to_string(),
        }
    }
}

/// Splitter output: a canonical tag decomposed into semantic atoms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResult {
    pub source: String,
    #[serde(default)]
    pub parts: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

impl SplitResult {
    /// Single-part split used when the splitter omitted the canonical tag.
    pub fn single(canonical: &str) -> Self {
        Self {
            source: canonical.to_string(),
            parts: vec![canonical.to_string()],
            reason: "fallback: no split record returned".to_string(),
        }
    }
}

/// Classifier output for one split part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedTag {
    pub source: String,
    #[serde(default)]
    pub class: TagClass,
    #[serde(default)]
    pub reason: String,
}

/// Descriptor-extractor output for one split part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorInfo {
    pub source: String,
    /// Advisory only; genre decisions come from the subgenre stage.
    #[serde(default)]
    pub genre_like: String,
    #[serde(default)]
    pub descriptors: Vec<String>,
    /// Rejected by the oracle; never surfaced as final tags.
    #[serde(default)]
    pub invalid_descriptors: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

/// Subgenre-mapper output for a genre or subgenre part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgenreInfo {
    pub source: String,
    #[serde(default)]
    pub is_subgenre: bool,
    #[serde(default)]
    pub parent_genre: String,
    #[serde(default)]
    pub reason: String,
}

// =============================================================================
// RESULT LOG ENTRY
// =============================================================================

/// One persisted line of the result log, keyed uniquely by `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMapEntry {
    /// Raw tag as it appeared in metadata.
    pub source: String,
    pub normalized_tags: Vec<String>,
    /// Aligned positionally with `normalized_tags`.
    pub tag_types: Vec<TagType>,
    pub canonical_stage: CanonicalTag,
    pub split_stage: SplitResult,
    #[serde(default)]
    pub classification_stage: Vec<ClassifiedTag>,
    #[serde(default)]
    pub descriptor_stage: Vec<DescriptorInfo>,
    #[serde(default)]
    pub subgenre_stage: Vec<SubgenreInfo>,
    #[serde(default)]
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl TagMapEntry {
    /// Whether the entry satisfies the tag/type alignment invariant.
    pub fn is_aligned(&self) -> bool {
        self.normalized_tags.len() == self.tag_types.len()
    }

    /// Iterate over `(tag, type)` pairs.
    pub fn typed_tags(&self) -> impl Iterator<Item = (&str, TagType)> {
        self.normalized_tags
            .iter()
            .map(String::as_str)
            .zip(self.tag_types.iter().copied())
    }
}
