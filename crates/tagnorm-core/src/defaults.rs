//! Centralized default constants for the tag pipeline.
//!
//! **This module is the single source of truth** for shared default values.
//! Binaries and library crates reference these constants instead of defining
//! their own magic numbers.

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "gpt-oss:20b";

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Timeout for the pre-run health probe in seconds.
pub const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Sampling temperature for every stage call. Zero keeps the oracle as
/// deterministic as the service allows.
pub const TEMPERATURE: f32 = 0.0;

/// Nucleus sampling cutoff for every stage call.
pub const TOP_P: f32 = 0.1;

/// Generation calls slower than this are logged with `slow = true`.
pub const SLOW_GENERATION_MS: u64 = 30_000;

// =============================================================================
// PIPELINE
// =============================================================================

/// Raw tags per orchestrator batch. One tag per batch isolates oracle
/// failures to a single tag.
pub const BATCH_SIZE: usize = 1;

/// Processing limit applied when `--limit` is passed without a value.
pub const PROCESS_LIMIT: usize = 25;

/// Default directory of per-song metadata records.
pub const SONGS_DIR: &str = "data/songs";

/// Default blacklist document path.
pub const BLACKLIST_PATH: &str = "data/tag_blacklist.json";

/// Default append-only result log path.
pub const RESULT_LOG_PATH: &str = "data/tag_map.jsonl";

/// Default directory holding the stage prompt files.
pub const PROMPTS_DIR: &str = "prompts";

/// Whether final normalized tags are filtered against the blacklist.
pub const FILTER_FINAL_TAGS: bool = true;

/// Name of the local tags field on a metadata record.
pub const LOCAL_TAGS_FIELD: &str = "tags";

/// `(namespace, field)` pairs scanned for tags on every metadata record.
pub const TAG_SOURCES: &[(&str, &str)] = &[
    ("lastfm", "tags"),
    ("musicbrainz", "artistTags"),
    ("musicbrainz", "artistGenres"),
    ("musicbrainz", "recordingGenres"),
];
