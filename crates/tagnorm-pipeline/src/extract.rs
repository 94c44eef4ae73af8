//! Raw tag extraction from the metadata corpus.
//!
//! The corpus is a directory of per-song JSON records. Tags are collected
//! from the record's own `tags` field and from each configured
//! `(namespace, field)` pair. No deduplication happens here.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use tagnorm_core::{defaults, Error, Result};

/// A tag-bearing field nested under a namespace object of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagSource {
    pub namespace: String,
    pub field: String,
}

impl TagSource {
    pub fn new(namespace: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            field: field.into(),
        }
    }

    /// Last.fm tags plus MusicBrainz artist tags/genres and recording genres.
    pub fn defaults() -> Vec<Self> {
        defaults::TAG_SOURCES
            .iter()
            .map(|(namespace, field)| Self::new(*namespace, *field))
            .collect()
    }

    fn collect(&self, record: &JsonValue, out: &mut Vec<String>) {
        if let Some(values) = record.get(&self.namespace).and_then(|ns| ns.get(&self.field)) {
            collect_strings(values, out);
        }
    }
}

impl fmt::Display for TagSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.field)
    }
}

impl FromStr for TagSource {
    type Err = Error;

    /// Parse `namespace.field`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once('.') {
            Some((namespace, field)) if !namespace.is_empty() && !field.is_empty() => {
                Ok(Self::new(namespace, field))
            }
            _ => Err(Error::Config(format!(
                "Invalid tag source '{}', expected namespace.field",
                s
            ))),
        }
    }
}

/// Push every non-blank string of a JSON array; anything else is ignored.
fn collect_strings(values: &JsonValue, out: &mut Vec<String>) {
    if let Some(items) = values.as_array() {
        out.extend(
            items
                .iter()
                .filter_map(JsonValue::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
        );
    }
}

/// Tags of a single parsed record.
pub fn tags_from_record(record: &JsonValue, sources: &[TagSource]) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(local) = record.get(defaults::LOCAL_TAGS_FIELD) {
        collect_strings(local, &mut tags);
    }
    for source in sources {
        source.collect(record, &mut tags);
    }
    tags
}

/// Collect raw tags from every `*.json` record in `songs_dir`.
///
/// Files are visited in name order so runs over an unchanged corpus are
/// deterministic. Unreadable or unparsable records are skipped with a
/// warning; a missing directory yields no tags.
pub fn load_all_tags(songs_dir: &Path, sources: &[TagSource]) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(songs_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(dir = %songs_dir.display(), "Songs directory not found, no tags extracted");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("json")
        })
        .collect();
    files.sort();

    let mut tags = Vec::new();
    let mut skipped = 0usize;
    for path in &files {
        let record = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<JsonValue>(&text).map_err(|e| e.to_string()));

        match record {
            Ok(record) => {
                let found = tags_from_record(&record, sources);
                debug!(file = %path.display(), count = found.len(), "Record tags collected");
                tags.extend(found);
            }
            Err(e) => {
                skipped += 1;
                warn!(file = %path.display(), error = %e, "Skipping unreadable metadata record");
            }
        }
    }

    info!(
        files = files.len(),
        skipped,
        raw_tags = tags.len(),
        "Tag extraction complete"
    );
    Ok(tags)
}
