//! Error types for lyref-detect
//!
//! Fatal batch failures only. Per-record validation failures and replies
//! without a JSON block are absorbed inside the pipeline and never reach here.

use lyref_common::SchemaError;
use std::path::PathBuf;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::prompt::TemplateError;

/// Batch-level failure
#[derive(Debug, Error)]
pub enum DetectError {
    /// Malformed corpus, detected before any model call
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A sequential-mode model call could not be completed
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// At least one concurrent call failed; no result is produced
    #[error("{failed} of {total} model calls failed, batch discarded: {first}")]
    FanOut {
        failed: usize,
        total: usize,
        /// First failure in completion order
        first: GatewayError,
    },

    #[error("Invalid prompt template: {0}")]
    Template(#[from] TemplateError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Corpus or output file could not be read, decoded or written
    #[error("{}: {message}", path.display())]
    File { path: PathBuf, message: String },

    /// Private runtime for the blocking executor could not start
    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

pub type DetectResult<T> = Result<T, DetectError>;
