//! Compact tag map export.
//!
//! Collapses the result log into one JSON object keyed by raw source, for
//! consumers that only need the final tags and their types.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use tagnorm_core::{Result, TagMapEntry, TagType};

use crate::result_log::ResultLog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedTags {
    pub tags: Vec<String>,
    pub types: Vec<TagType>,
}

/// Source → final tags. A later entry for the same source wins.
pub fn build_export(entries: &[TagMapEntry]) -> BTreeMap<String, ExportedTags> {
    entries
        .iter()
        .map(|e| {
            (
                e.source.clone(),
                ExportedTags {
                    tags: e.normalized_tags.clone(),
                    types: e.tag_types.clone(),
                },
            )
        })
        .collect()
}

/// Write the export of `log` to `path`. Returns the number of sources.
pub async fn export_tag_map(log: &ResultLog, path: &Path) -> Result<usize> {
    let map = build_export(&log.load_entries().await?);
    let json = serde_json::to_string(&map)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;

    info!(path = %path.display(), sources = map.len(), "Tag map exported");
    Ok(map.len())
}
