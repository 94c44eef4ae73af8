//! Stage identities and their system prompts.
//!
//! Prompts are loaded once at startup into an immutable [`StagePrompts`]
//! value. A missing or empty prompt file is a configuration error: every
//! call for that stage would be meaningless without it.

use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use tagnorm_core::{Error, Result};

/// The five oracle stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Canonicalize,
    Split,
    Classify,
    Descriptors,
    Subgenre,
}

impl Stage {
    /// All stages in the order the orchestrator runs them.
    pub const ALL: [Stage; 5] = [
        Stage::Canonicalize,
        Stage::Split,
        Stage::Classify,
        Stage::Descriptors,
        Stage::Subgenre,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Canonicalize => "canonicalize",
            Stage::Split => "split",
            Stage::Classify => "classify",
            Stage::Descriptors => "descriptors",
            Stage::Subgenre => "subgenre",
        }
    }

    /// Prompt file name inside the prompts directory.
    pub fn file_name(&self) -> String {
        format!("{}.txt", self.as_str())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// System prompts for every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePrompts {
    pub canonicalize: String,
    pub split: String,
    pub classify: String,
    pub descriptors: String,
    pub subgenre: String,
}

impl StagePrompts {
    /// Load `<stage>.txt` for every stage from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let read = |stage: Stage| -> Result<String> {
            let path = dir.join(stage.file_name());
            let text = std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!(
                    "Failed to read {} prompt at {}: {}",
                    stage,
                    path.display(),
                    e
                ))
            })?;
            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(Error::Config(format!(
                    "Prompt file for {} stage is empty: {}",
                    stage,
                    path.display()
                )));
            }
            debug!(stage = stage.as_str(), prompt_len = text.len(), "Loaded prompt");
            Ok(text)
        };

        let prompts = Self {
            canonicalize: read(Stage::Canonicalize)?,
            split: read(Stage::Split)?,
            classify: read(Stage::Classify)?,
            descriptors: read(Stage::Descriptors)?,
            subgenre: read(Stage::Subgenre)?,
        };
        info!(dir = %dir.display(), "Stage prompts loaded");
        Ok(prompts)
    }

    /// Prompt for a stage.
    pub fn get(&self, stage: Stage) -> &str {
        match stage {
            Stage::Canonicalize => &self.canonicalize,
            Stage::Split => &self.split,
            Stage::Classify => &self.classify,
            Stage::Descriptors => &self.descriptors,
            Stage::Subgenre => &self.subgenre,
        }
    }

    /// Short distinct prompts, one per stage, for scripted backends.
    #[cfg(any(test, feature = "mock"))]
    pub fn placeholder() -> Self {
        Self {
            canonicalize: "PROMPT:canonicalize".to_string(),
            split: "PROMPT:split".to_string(),
            classify: "PROMPT:classify".to_string(),
            descriptors: "PROMPT:descriptors".to_string(),
            subgenre: "PROMPT:subgenre".to_string(),
        }
    }

    /// Stage whose prompt equals `system`, if any.
    pub fn stage_for(&self, system: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|stage| self.get(*stage) == system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_all(dir: &Path) {
        for stage in Stage::ALL {
            std::fs::write(
                dir.join(stage.file_name()),
                format!("  You are the {} stage.\n", stage),
            )
            .unwrap();
        }
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<_> = Stage::ALL.iter().map(Stage::as_str).collect();
        assert_eq!(
            names,
            vec!["canonicalize", "split", "classify", "descriptors", "subgenre"]
        );
        assert_eq!(Stage::Split.file_name(), "split.txt");
    }

    #[test]
    fn test_load_all_prompts() {
        let dir = tempdir().unwrap();
        write_all(dir.path());

        let prompts = StagePrompts::load(dir.path()).unwrap();
        assert_eq!(prompts.get(Stage::Subgenre), "You are the subgenre stage.");
        assert_eq!(prompts.get(Stage::Canonicalize), "You are the canonicalize stage.");
    }

    #[test]
    fn test_missing_prompt_fails_fast() {
        let dir = tempdir().unwrap();
        write_all(dir.path());
        std::fs::remove_file(dir.path().join("classify.txt")).unwrap();

        let err = StagePrompts::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("classify"));
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let dir = tempdir().unwrap();
        write_all(dir.path());
        std::fs::write(dir.path().join("split.txt"), "  \n").unwrap();

        let err = StagePrompts::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_stage_for_prompt() {
        let prompts = StagePrompts::placeholder();
        assert_eq!(prompts.stage_for("PROMPT:classify"), Some(Stage::Classify));
        assert_eq!(prompts.stage_for("something else"), None);
    }
}
