//! tagnorm - resumable music tag normalization
//!
//! Usage:
//!   tagnorm
//!   tagnorm --limit=100
//!   tagnorm --dry-run
//!   tagnorm --export=data/tag_map.json

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tagnorm_inference::{OllamaBackend, StagePrompts, TagOracle};
use tagnorm_pipeline::cli::USAGE;
use tagnorm_pipeline::export::export_tag_map;
use tagnorm_pipeline::{
    Blacklist, BatchRunner, CliArgs, PipelineConfig, ResultLog, TagMapBuilder,
};

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter
fn init_tracing() -> Option<WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tagnorm=info,tagnorm_pipeline=info,tagnorm_inference=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("tagnorm.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false)); // no ANSI in files by default
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let _log_guard = init_tracing();

    let args = CliArgs::from_env();
    if args.help {
        print!("{}", USAGE);
        return Ok(());
    }

    let config = PipelineConfig::from_env();
    info!(
        songs_dir = %config.songs_dir.display(),
        result_log = %config.result_log_path.display(),
        batch_size = config.batch_size,
        limit = ?args.limit,
        dry_run = args.dry_run,
        filter_final_tags = config.filter_final_tags,
        "Configuration loaded"
    );

    // Every stage call is meaningless without its prompt.
    let prompts = StagePrompts::load(&config.prompts_dir).with_context(|| {
        format!(
            "failed to load stage prompts from {}",
            config.prompts_dir.display()
        )
    })?;

    let backend = OllamaBackend::from_env();
    info!(
        base_url = backend.base_url(),
        timeout_secs = backend.timeout_secs(),
        "Oracle backend configured"
    );
    let oracle = TagOracle::new(Arc::new(backend), prompts);
    info!(model = oracle.model_name(), "Oracle model");

    let blacklist = Arc::new(Blacklist::load(&config.blacklist_path));

    let mut builder = TagMapBuilder::new(oracle);
    if config.filter_final_tags {
        builder = builder.with_final_tag_filter(blacklist.clone());
    }

    if !args.dry_run {
        match builder.health_check().await {
            Ok(true) => info!("Oracle reachable"),
            Ok(false) => warn!("Oracle health check failed, batches may fail"),
            Err(e) => warn!(error = %e, "Oracle health check errored, batches may fail"),
        }
    }

    let log = ResultLog::new(&config.result_log_path);
    let runner = BatchRunner::new(
        builder,
        blacklist,
        log.clone(),
        config.runner_config(&args),
    );

    let summary = runner.run().await.context("tag normalization run failed")?;
    info!(
        summary = %serde_json::to_string(&summary).unwrap_or_default(),
        "Pipeline finished"
    );

    if let Some(path) = &args.export {
        export_tag_map(&log, path)
            .await
            .with_context(|| format!("failed to export tag map to {}", path.display()))?;
    }

    Ok(())
}
