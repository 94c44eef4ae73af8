//! # tagnorm-inference
//!
//! Classification oracle for the tag normalization pipeline.
//!
//! This crate provides:
//! - Ollama chat backend (default, feature `ollama`)
//! - Stage prompts loaded from disk
//! - Response cleaning for fenced or chatty JSON output
//! - [`TagOracle`], the five stage calls with per-record decoding
//! - A scripted mock backend for tests (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tagnorm_inference::{OllamaBackend, StagePrompts, TagOracle};
//!
//! #[tokio::main]
//! async fn main() -> tagnorm_core::Result<()> {
//!     let prompts = StagePrompts::load(std::path::Path::new("prompts"))?;
//!     let oracle = TagOracle::new(Arc::new(OllamaBackend::from_env()), prompts);
//!     let canonical = oracle.canonicalize(&["Deep House".to_string()]).await?;
//!     println!("{:?}", canonical);
//!     Ok(())
//! }
//! ```

pub mod oracle;
pub mod prompts;
pub mod response;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;

pub use oracle::TagOracle;
pub use prompts::{Stage, StagePrompts};
pub use response::{clean_response, parse_json_array};
