//! Rejected-tag blacklist.
//!
//! Loaded once at startup and read-only for the rest of the run. A missing
//! or corrupt blacklist document degrades to "no filtering" with a warning;
//! it never stops the pipeline.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use tagnorm_core::normalize;

/// Field of the blacklist document holding the rejected tags.
const BLACKLIST_FIELD: &str = "blacklistedTags";

/// Set of normalized rejected tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    tags: HashSet<String>,
}

/// Result of [`Blacklist::filter`]. Raw strings are preserved as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlacklistPartition {
    pub kept: Vec<String>,
    pub removed: Vec<String>,
}

impl Blacklist {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from arbitrary strings; entries are normalized and empties dropped.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tags: tags
                .into_iter()
                .map(|t| normalize(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Load `{"blacklistedTags": [...]}` from `path`.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Blacklist unreadable, no tags will be filtered");
                return Self::empty();
            }
        };

        match Self::parse(&text) {
            Ok(blacklist) => {
                info!(path = %path.display(), count = blacklist.len(), "Blacklist loaded");
                blacklist
            }
            Err(reason) => {
                warn!(path = %path.display(), reason = %reason, "Blacklist invalid, no tags will be filtered");
                Self::empty()
            }
        }
    }

    fn parse(text: &str) -> std::result::Result<Self, String> {
        let doc: JsonValue = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let items = doc
            .get(BLACKLIST_FIELD)
            .and_then(JsonValue::as_array)
            .ok_or_else(|| format!("`{}` is missing or not an array", BLACKLIST_FIELD))?;

        let mut tags = Vec::with_capacity(items.len());
        for item in items {
            match item.as_str() {
                Some(s) => tags.push(s),
                None => return Err(format!("`{}` contains a non-string: {}", BLACKLIST_FIELD, item)),
            }
        }
        Ok(Self::from_tags(tags))
    }

    /// Membership test on the normalized form of `tag`.
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(&normalize(tag))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Partition raw tags into kept and removed, preserving input order.
    pub fn filter<I, S>(&self, raw_tags: I) -> BlacklistPartition
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut partition = BlacklistPartition::default();
        for raw in raw_tags {
            let raw = raw.into();
            if self.contains(&raw) {
                debug!(tag = %raw, "Blacklisted tag removed");
                partition.removed.push(raw);
            } else {
                partition.kept.push(raw);
            }
        }
        partition
    }
}
