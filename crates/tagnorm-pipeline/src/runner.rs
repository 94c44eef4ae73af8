//! Resumable batch runner.
//!
//! Each run re-derives its to-do list from the corpus and the result log:
//! distinct normalized tags, minus the blacklist, minus every source the log
//! already holds. Batches run strictly in order. A failed batch is logged
//! and skipped, never retried within the run, and its tags stay on the
//! to-do list for the next run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, instrument};

use tagnorm_core::{defaults, normalize, Result};

use crate::blacklist::Blacklist;
use crate::extract::{load_all_tags, TagSource};
use crate::orchestrator::TagMapBuilder;
use crate::result_log::ResultLog;

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub songs_dir: PathBuf,
    pub tag_sources: Vec<TagSource>,
    /// Raw tags per orchestration pass (minimum 1).
    pub batch_size: usize,
    /// Truncate the working set before the resumption diff.
    pub limit: Option<usize>,
    /// Stop after computing the to-do list.
    pub dry_run: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            songs_dir: PathBuf::from(defaults::SONGS_DIR),
            tag_sources: TagSource::defaults(),
            batch_size: defaults::BATCH_SIZE,
            limit: None,
            dry_run: false,
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub raw_tags: usize,
    pub unique_tags: usize,
    pub blacklisted: usize,
    pub kept: usize,
    pub already_processed: usize,
    pub to_process: usize,
    pub processed: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub entries_written: usize,
    /// Entries saved with no final tags left after blacklist filtering.
    pub empty_entries: usize,
}

/// One representative raw tag per normalized form, in first-seen order.
pub fn dedupe_by_normalized(raw_tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw_tags
        .into_iter()
        .filter(|t| {
            let key = normalize(t);
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

pub struct BatchRunner {
    builder: TagMapBuilder,
    blacklist: Arc<Blacklist>,
    log: ResultLog,
    config: RunnerConfig,
}

impl BatchRunner {
    pub fn new(
        builder: TagMapBuilder,
        blacklist: Arc<Blacklist>,
        log: ResultLog,
        config: RunnerConfig,
    ) -> Self {
        Self {
            builder,
            blacklist,
            log,
            config: RunnerConfig {
                batch_size: config.batch_size.max(1),
                ..config
            },
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Execute one run. Batch failures are counted, not returned; only
    /// corpus or log read failures end the run with an error.
    #[instrument(skip(self), fields(subsystem = "pipeline", component = "runner", run_id = %uuid::Uuid::now_v7()))]
    pub async fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::default();

        let raw_tags = load_all_tags(&self.config.songs_dir, &self.config.tag_sources)?;
        summary.raw_tags = raw_tags.len();

        let unique = dedupe_by_normalized(raw_tags);
        summary.unique_tags = unique.len();

        let partition = self.blacklist.filter(unique);
        summary.blacklisted = partition.removed.len();
        let mut working = partition.kept;
        info!(
            raw = summary.raw_tags,
            unique = summary.unique_tags,
            blacklisted = summary.blacklisted,
            kept = working.len(),
            "Working set built"
        );

        if let Some(limit) = self.config.limit {
            if working.len() > limit {
                info!(limit, dropped = working.len() - limit, "Processing limit applied");
                working.truncate(limit);
            }
        }
        summary.kept = working.len();

        let mut processed = self.log.processed_sources().await?;
        let todo: Vec<String> = working
            .into_iter()
            .filter(|t| !processed.contains(&normalize(t)))
            .collect();
        summary.already_processed = summary.kept - todo.len();
        summary.to_process = todo.len();
        info!(
            already_processed = summary.already_processed,
            to_process = summary.to_process,
            "Resumption diff computed"
        );

        if todo.is_empty() {
            info!("Nothing to process");
            return Ok(summary);
        }
        if self.config.dry_run {
            info!(to_process = summary.to_process, "Dry run, oracle not called");
            return Ok(summary);
        }

        for (batch_index, batch) in todo.chunks(self.config.batch_size).enumerate() {
            summary.batches += 1;
            let batch_start = Instant::now();

            let result = match self.builder.build_batch(batch).await {
                Ok(entries) => self.log.append(&entries).await.map(|_| entries),
                Err(e) => Err(e),
            };

            match result {
                Ok(entries) => {
                    for entry in &entries {
                        processed.insert(normalize(&entry.source));
                    }
                    summary.processed += batch.len();
                    summary.entries_written += entries.len();
                    summary.empty_entries += entries
                        .iter()
                        .filter(|e| e.normalized_tags.is_empty())
                        .count();
                    debug!(
                        batch_index,
                        tags = batch.len(),
                        duration_ms = batch_start.elapsed().as_millis() as u64,
                        "Batch persisted"
                    );
                }
                Err(e) => {
                    summary.failed_batches += 1;
                    error!(
                        batch_index,
                        tags = ?batch,
                        recoverable = e.is_batch_recoverable(),
                        error = %e,
                        "Batch failed, skipping until next run"
                    );
                }
            }
        }

        info!(
            processed = summary.processed,
            batches = summary.batches,
            failed_batches = summary.failed_batches,
            entries_written = summary.entries_written,
            empty_entries = summary.empty_entries,
            duration_ms = start.elapsed().as_millis() as u64,
            "Run complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tagnorm_inference::mock::MockGenerationBackend;
    use tagnorm_inference::{StagePrompts, TagOracle};
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
        backend: MockGenerationBackend,
    }

    impl Fixture {
        fn new(records: &[serde_json::Value]) -> Self {
            let dir = tempdir().unwrap();
            let songs = dir.path().join("songs");
            std::fs::create_dir_all(&songs).unwrap();
            for (i, record) in records.iter().enumerate() {
                std::fs::write(songs.join(format!("{:03}.json", i)), record.to_string()).unwrap();
            }
            Self {
                dir,
                backend: MockGenerationBackend::new(),
            }
        }

        fn log(&self) -> ResultLog {
            ResultLog::new(self.dir.path().join("tag_map.jsonl"))
        }

        fn runner(&self, blacklist: Blacklist, config: RunnerConfig) -> BatchRunner {
            let oracle = TagOracle::new(Arc::new(self.backend.clone()), StagePrompts::placeholder());
            BatchRunner::new(
                TagMapBuilder::new(oracle),
                Arc::new(blacklist),
                self.log(),
                RunnerConfig {
                    songs_dir: self.dir.path().join("songs"),
                    ..config
                },
            )
        }
    }

    #[test]
    fn test_dedupe_by_normalized_keeps_first() {
        let tags = dedupe_by_normalized(vec![
            "Rock".into(),
            "rock".into(),
            "  ROCK ".into(),
            "Jazz".into(),
        ]);
        assert_eq!(tags, vec!["Rock", "Jazz"]);
    }

    #[tokio::test]
    async fn test_counts_and_blacklist() {
        let fixture = Fixture::new(&[
            json!({"tags": ["Rock", "seen live"], "lastfm": {"tags": ["rock", "Jazz"]}}),
        ]);
        let runner = fixture.runner(Blacklist::from_tags(["Seen Live"]), RunnerConfig::default());

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.raw_tags, 4);
        assert_eq!(summary.unique_tags, 3);
        assert_eq!(summary.blacklisted, 1);
        assert_eq!(summary.kept, 2);
        assert_eq!(summary.to_process, 2);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.entries_written, 2);

        let sources: Vec<_> = fixture
            .log()
            .load_entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.source)
            .collect();
        assert_eq!(sources, vec!["Rock", "Jazz"]);
    }

    #[tokio::test]
    async fn test_limit_truncates_working_set() {
        let fixture = Fixture::new(&[json!({"tags": ["a", "b", "c", "d"]})]);
        let runner = fixture.runner(
            Blacklist::empty(),
            RunnerConfig {
                limit: Some(2),
                ..RunnerConfig::default()
            },
        );

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.kept, 2);
        assert_eq!(summary.processed, 2);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let fixture = Fixture::new(&[json!({"tags": ["Rock"]})]);
        let runner = fixture.runner(
            Blacklist::empty(),
            RunnerConfig {
                dry_run: true,
                ..RunnerConfig::default()
            },
        );

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.to_process, 1);
        assert_eq!(summary.processed, 0);
        assert_eq!(fixture.backend.call_count(), 0);
        assert!(!fixture.log().path().exists());
    }

    #[tokio::test]
    async fn test_batch_size_groups_tags() {
        let fixture = Fixture::new(&[json!({"tags": ["a", "b", "c"]})]);
        let runner = fixture.runner(
            Blacklist::empty(),
            RunnerConfig {
                batch_size: 2,
                ..RunnerConfig::default()
            },
        );

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.entries_written, 3);
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_clamped() {
        let fixture = Fixture::new(&[]);
        let runner = fixture.runner(
            Blacklist::empty(),
            RunnerConfig {
                batch_size: 0,
                ..RunnerConfig::default()
            },
        );
        assert_eq!(runner.config().batch_size, 1);
        assert_eq!(runner.run().await.unwrap(), RunSummary::default());
    }
}
