//! Command-line arguments for the `tagnorm` binary.

use std::path::PathBuf;

use tracing::warn;

use tagnorm_core::defaults;

pub const USAGE: &str = "\
Usage: tagnorm [OPTIONS]

Normalize music metadata tags through the classification oracle and append
the results to the result log. Already-processed tags are skipped.

Options:
  --limit[=N]      Process at most N tags this run (bare flag: 25)
  --dry-run        Report what would be processed without calling the oracle
  --export=PATH    Write a compact {source: {tags, types}} map after the run
  -h, --help       Print this help

Environment:
  OLLAMA_BASE, OLLAMA_GEN_MODEL, TAGNORM_GEN_TIMEOUT_SECS,
  TAGNORM_SONGS_DIR, TAGNORM_BLACKLIST, TAGNORM_RESULT_LOG,
  TAGNORM_PROMPTS_DIR, TAGNORM_BATCH_SIZE, TAGNORM_FILTER_FINAL_TAGS,
  TAGNORM_TAG_SOURCES, RUST_LOG, LOG_FORMAT, LOG_FILE, LOG_ANSI
";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Truncate the working set to this many tags.
    pub limit: Option<usize>,
    pub dry_run: bool,
    pub export: Option<PathBuf>,
    pub help: bool,
}

impl CliArgs {
    /// Parse the process arguments.
    pub fn from_env() -> Self {
        parse_args(std::env::args().skip(1))
    }
}

/// Parse arguments (program name excluded). Never fails; problems are
/// warned about and the offending flag ignored.
pub fn parse_args<I, S>(args: I) -> CliArgs
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = CliArgs::default();

    for arg in args {
        let arg = arg.as_ref();
        match arg.split_once('=') {
            None => match arg {
                "--limit" => result.limit = Some(defaults::PROCESS_LIMIT),
                "--dry-run" => result.dry_run = true,
                "--help" | "-h" => result.help = true,
                "--export" => warn!("--export needs a path, use --export=PATH"),
                _ => warn!(arg = %arg, "Ignoring unknown argument"),
            },
            Some(("--limit", value)) => result.limit = parse_limit(value),
            Some(("--export", path)) if !path.trim().is_empty() => {
                result.export = Some(PathBuf::from(path))
            }
            Some(("--export", _)) => warn!("--export needs a path, use --export=PATH"),
            Some(_) => warn!(arg = %arg, "Ignoring unknown argument"),
        }
    }

    result
}

/// `N` must be a positive integer; anything else warns and means no limit.
pub fn parse_limit(value: &str) -> Option<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!(value = %value, "Invalid --limit value, processing without a limit");
            None
        }
    }
}
