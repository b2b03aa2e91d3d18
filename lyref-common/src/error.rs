//! Common error types for lyref

use thiserror::Error;

use crate::schema::SchemaError;

/// Common result type for lyref operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the lyref crates
#[derive(Error, Debug)]
pub enum Error {
    /// Corpus input did not match the song/annotation shape
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML encoding or decoding error
    #[error("TOML error: {0}")]
    Toml(String),
}
