//! Error types for llmstxt.
//!
//! Library crates use [`LlmsTxtError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all llmstxt operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmsTxtError {
    /// Configuration loading, validation, or credential error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a page.
    #[error("network error: {0}")]
    Network(String),

    /// Document, query-set, or page parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Generative backend error that could not be degraded locally.
    #[error("backend error: {0}")]
    Backend(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (broken invariant, empty crawl, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The operation was interrupted before it could produce a result.
    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LlmsTxtError>;

impl LlmsTxtError {
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
