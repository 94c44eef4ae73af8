//! Pipeline configuration from the environment.

use std::path::PathBuf;

use tracing::warn;

use tagnorm_core::defaults;

use crate::cli::CliArgs;
use crate::extract::TagSource;
use crate::runner::RunnerConfig;

/// Locations and tunables for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub songs_dir: PathBuf,
    pub blacklist_path: PathBuf,
    pub result_log_path: PathBuf,
    pub prompts_dir: PathBuf,
    pub tag_sources: Vec<TagSource>,
    pub batch_size: usize,
    /// Also blacklist-filter assembled final tags.
    pub filter_final_tags: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            songs_dir: PathBuf::from(defaults::SONGS_DIR),
            blacklist_path: PathBuf::from(defaults::BLACKLIST_PATH),
            result_log_path: PathBuf::from(defaults::RESULT_LOG_PATH),
            prompts_dir: PathBuf::from(defaults::PROMPTS_DIR),
            tag_sources: TagSource::defaults(),
            batch_size: defaults::BATCH_SIZE,
            filter_final_tags: defaults::FILTER_FINAL_TAGS,
        }
    }
}

fn env_path(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> PathBuf {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// Parse a comma-separated `namespace.field` list, skipping bad entries.
fn parse_tag_sources(value: &str) -> Vec<TagSource> {
    value
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| match s.parse::<TagSource>() {
            Ok(source) => Some(source),
            Err(e) => {
                warn!(error = %e, "Ignoring tag source");
                None
            }
        })
        .collect()
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `TAGNORM_SONGS_DIR` | `data/songs` | Directory of per-song JSON records |
    /// | `TAGNORM_BLACKLIST` | `data/tag_blacklist.json` | Rejected-tag document |
    /// | `TAGNORM_RESULT_LOG` | `data/tag_map.jsonl` | Append-only result log |
    /// | `TAGNORM_PROMPTS_DIR` | `prompts` | Stage prompt files |
    /// | `TAGNORM_TAG_SOURCES` | Last.fm + MusicBrainz fields | Comma-separated `namespace.field` list |
    /// | `TAGNORM_BATCH_SIZE` | `1` | Raw tags per orchestration pass |
    /// | `TAGNORM_FILTER_FINAL_TAGS` | `true` | Blacklist-filter final tags |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup, applying the same defaults and
    /// validation as [`PipelineConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let tag_sources = lookup("TAGNORM_TAG_SOURCES")
            .map(|v| parse_tag_sources(&v))
            .filter(|sources| !sources.is_empty())
            .unwrap_or_else(TagSource::defaults);

        let batch_size = lookup("TAGNORM_BATCH_SIZE")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(defaults::BATCH_SIZE)
            .max(1);

        let filter_final_tags = lookup("TAGNORM_FILTER_FINAL_TAGS")
            .map(|v| !matches!(v.trim(), "false" | "0"))
            .unwrap_or(defaults::FILTER_FINAL_TAGS);

        Self {
            songs_dir: env_path(&lookup, "TAGNORM_SONGS_DIR", defaults::SONGS_DIR),
            blacklist_path: env_path(&lookup, "TAGNORM_BLACKLIST", defaults::BLACKLIST_PATH),
            result_log_path: env_path(&lookup, "TAGNORM_RESULT_LOG", defaults::RESULT_LOG_PATH),
            prompts_dir: env_path(&lookup, "TAGNORM_PROMPTS_DIR", defaults::PROMPTS_DIR),
            tag_sources,
            batch_size,
            filter_final_tags,
        }
    }

    /// Runner settings for this config and the parsed command line.
    pub fn runner_config(&self, args: &CliArgs) -> RunnerConfig {
        RunnerConfig {
            songs_dir: self.songs_dir.clone(),
            tag_sources: self.tag_sources.clone(),
            batch_size: self.batch_size,
            limit: args.limit,
            dry_run: args.dry_run,
        }
    }
}
