//! Append-only newline-delimited JSON result log.
//!
//! The log is both the pipeline's output and its resumption checkpoint. Lines
//! are only ever appended; a line that fails to parse is skipped on load so a
//! torn final write never blocks a restart.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use tagnorm_core::{normalize, Result, TagMapEntry};

/// Handle to the result log file. Single writer per file.
#[derive(Debug, Clone)]
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every parsable entry in log order. A missing file is an empty log.
    pub async fn load_entries(&self) -> Result<Vec<TagMapEntry>> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Result log not found, starting fresh");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TagMapEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    skipped += 1;
                    warn!(line = index + 1, error = %e, "Skipping unparsable result log line");
                }
            }
        }

        info!(
            path = %self.path.display(),
            entries = entries.len(),
            skipped,
            "Result log loaded"
        );
        Ok(entries)
    }

    /// Normalized sources already present in the log.
    pub async fn processed_sources(&self) -> Result<HashSet<String>> {
        Ok(self
            .load_entries()
            .await?
            .iter()
            .map(|e| normalize(&e.source))
            .collect())
    }

    /// Append `entries`, one JSON object per line, in a single write.
    ///
    /// Every entry is serialized before the file is touched, so a
    /// serialization error appends nothing.
    pub async fn append(&self, entries: &[TagMapEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;

        debug!(path = %self.path.display(), count = entries.len(), "Entries appended");
        Ok(())
    }
}
