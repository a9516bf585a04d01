//! Error types for wikidex.
//!
//! Library crates use [`WikidexError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Malformed markup is never an error (the normalizer degrades instead) and
//! lookups that find nothing return `Ok(None)` or an empty `Vec`. What is left
//! here are the failures a caller can act on: bad configuration, failed or
//! rejected writes, and I/O.

use std::path::PathBuf;

/// Top-level error type for all wikidex operations.
#[derive(Debug, thiserror::Error)]
pub enum WikidexError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Input that could not be decoded (e.g. a malformed JSON line).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error. A failed batch has been rolled back.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A document or argument rejected before it reached the database.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, WikidexError>;

impl WikidexError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
