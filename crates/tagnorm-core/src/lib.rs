//! # tagnorm-core
//!
//! Core types, traits, and abstractions for the tagnorm tag normalization
//! pipeline.
//!
//! This crate provides the data model shared by every pipeline stage, the
//! universal string normalizer used as the join key between stage outputs,
//! and the generation backend trait the classification oracle is built on.
//!
//! ## Log Level Contract
//!
//! All crates log through `tracing` with the structured fields `subsystem`,
//! `component`, `op`, `stage`, `batch_index` and `duration_ms`.
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Batch failed, tags left for the next run |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Run lifecycle, per-batch completions, summary counts |
//! | DEBUG | Stage input/output sizes, decision points |
//! | TRACE | Per-tag assembly detail |

pub mod defaults;
pub mod error;
pub mod models;
pub mod normalize;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use normalize::{normalize, normalize_value};
pub use traits::*;
