//! Per-batch orchestration of the five oracle stages.
//!
//! Canonicalization runs over the raw tags. Every later stage runs over the
//! smallest distinct-value set available: distinct canonical strings for the
//! splitter, distinct parts for the classifier and descriptor extractor, and
//! only the genre-like parts for the subgenre mapper.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use tagnorm_core::{normalize, Result, SplitResult, TagMapEntry};
use tagnorm_inference::TagOracle;

use crate::assemble::{
    apply_blacklist_to_final_tags, assemble_entry, canonical_form, StageLookups,
};
use crate::blacklist::Blacklist;

/// Keep only records whose source was part of the stage input.
fn retain_requested<T>(records: Vec<T>, inputs: &[String], source: fn(&T) -> &str) -> Vec<T> {
    let inputs: HashSet<&str> = inputs.iter().map(String::as_str).collect();
    let before = records.len();
    let kept: Vec<T> = records
        .into_iter()
        .filter(|r| inputs.contains(source(r)))
        .collect();
    if kept.len() < before {
        debug!(dropped = before - kept.len(), "Ignoring records for unrequested tags");
    }
    kept
}

/// Push `value` unless empty or already present.
fn push_distinct(out: &mut Vec<String>, seen: &mut HashSet<String>, value: &str) {
    if !value.is_empty() && seen.insert(value.to_string()) {
        out.push(value.to_string());
    }
}

/// Builds result-log entries for a batch of distinct raw tags.
#[derive(Clone)]
pub struct TagMapBuilder {
    oracle: TagOracle,
    final_tag_filter: Option<Arc<Blacklist>>,
}

impl TagMapBuilder {
    pub fn new(oracle: TagOracle) -> Self {
        Self {
            oracle,
            final_tag_filter: None,
        }
    }

    /// Also filter assembled final tags against `blacklist`.
    pub fn with_final_tag_filter(mut self, blacklist: Arc<Blacklist>) -> Self {
        self.final_tag_filter = Some(blacklist);
        self
    }

    pub fn model_name(&self) -> &str {
        self.oracle.model_name()
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.oracle.health_check().await
    }

    /// Run all stages for `batch` and assemble one entry per raw tag.
    ///
    /// Any stage error fails the whole batch; no partial entries are
    /// returned.
    #[instrument(skip(self, batch), fields(subsystem = "pipeline", component = "orchestrator", batch_size = batch.len()))]
    pub async fn build_batch(&self, batch: &[String]) -> Result<Vec<TagMapEntry>> {
        let start = Instant::now();
        let requested: HashSet<String> = batch.iter().map(|t| normalize(t)).collect();

        // 1. canonicalize raw tags
        let canonical_records: Vec<_> = self
            .oracle
            .canonicalize(batch)
            .await?
            .into_iter()
            .filter(|r| requested.contains(&r.source))
            .collect();
        let mut lookups = StageLookups::new().with_canonical(canonical_records);

        let mut canonicals = Vec::new();
        let mut seen = HashSet::new();
        for raw in batch {
            if let Some(record) = lookups.canonical_for(raw) {
                push_distinct(&mut canonicals, &mut seen, &canonical_form(record, raw));
            }
        }

        // 2. split distinct canonicals
        let splits = self.oracle.split(&canonicals).await?;
        lookups = lookups.with_splits(retain_requested(splits, &canonicals, |r| {
            r.source.as_str()
        }));
        for canonical in &canonicals {
            if !lookups.splits.contains_key(canonical) {
                lookups
                    .splits
                    .insert(canonical.clone(), SplitResult::single(canonical));
            }
        }

        let mut parts = Vec::new();
        let mut seen = HashSet::new();
        for canonical in &canonicals {
            if let Some(split) = lookups.splits.get(canonical) {
                for part in &split.parts {
                    push_distinct(&mut parts, &mut seen, part);
                }
            }
        }

        // 3. classify and describe distinct parts
        let classes = self.oracle.classify(&parts).await?;
        lookups = lookups.with_classes(retain_requested(classes, &parts, |r| r.source.as_str()));
        let descriptors = self.oracle.extract_descriptors(&parts).await?;
        lookups = lookups.with_descriptors(retain_requested(descriptors, &parts, |r| {
            r.source.as_str()
        }));

        // 4. parent genres for genre-like parts only
        let genre_parts: Vec<String> = parts
            .iter()
            .filter(|p| {
                lookups
                    .classes
                    .get(*p)
                    .map(|c| c.class.is_genre_like())
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        let subgenres = self.oracle.map_subgenres(&genre_parts).await?;
        lookups = lookups.with_subgenres(retain_requested(subgenres, &genre_parts, |r| {
            r.source.as_str()
        }));

        debug!(
            canonicals = canonicals.len(),
            parts = parts.len(),
            genre_parts = genre_parts.len(),
            "Stage lookups built"
        );

        let model = self.oracle.model_name().to_string();
        let entries = batch
            .iter()
            .map(|raw| {
                let mut entry = assemble_entry(raw, &lookups, &model);
                if let Some(filter) = &self.final_tag_filter {
                    let removed = apply_blacklist_to_final_tags(&mut entry, filter);
                    if removed > 0 && entry.normalized_tags.is_empty() {
                        warn!(
                            tag = %raw,
                            canonical = %entry.canonical_stage.canonical,
                            removed,
                            "Every final tag is blacklisted, saving empty entry"
                        );
                    }
                }
                entry
            })
            .collect::<Vec<_>>();

        debug!(
            entries = entries.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch assembled"
        );
        Ok(entries)
    }
}
