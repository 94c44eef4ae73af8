//! # tagnorm-pipeline
//!
//! Resumable tag normalization pipeline.
//!
//! Data flow: [`extract`] → [`blacklist`] → [`runner`] → (per batch)
//! [`orchestrator`] → [`assemble`] → [`result_log`].
//!
//! The result log is append-only newline-delimited JSON and doubles as the
//! resumption checkpoint: a tag whose normalized form already has an entry
//! is never sent to the oracle again, and a failed batch leaves its tags for
//! the next run.

pub mod assemble;
pub mod blacklist;
pub mod cli;
pub mod config;
pub mod export;
pub mod extract;
pub mod orchestrator;
pub mod result_log;
pub mod runner;

pub use assemble::{apply_blacklist_to_final_tags, assemble_entry, StageLookups};
pub use blacklist::{Blacklist, BlacklistPartition};
pub use cli::CliArgs;
pub use config::PipelineConfig;
pub use export::{build_export, export_tag_map, ExportedTags};
pub use extract::{load_all_tags, TagSource};
pub use orchestrator::TagMapBuilder;
pub use result_log::ResultLog;
pub use runner::{BatchRunner, RunSummary, RunnerConfig};
