//! Error types for the play-log pipeline.
//!
//! Only failures the caller must act on live here. Field and block level
//! parse problems are absorbed by the extractor, and an unreadable store is
//! replaced by an empty one on load.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for play-log operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem failure while writing the store or an export
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure while writing the store or an export
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Output path rejected by the export safety check
    #[error("Unsafe output path {path:?}: {reason}")]
    UnsafeOutput { path: PathBuf, reason: String },
}
