//! Error types for WikiSync.
//!
//! Library crates use [`WikiSyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all WikiSync operations.
#[derive(Debug, thiserror::Error)]
pub enum WikiSyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Missing or unusable wiki credentials. Fatal: checked before the
    /// first request, never retried.
    #[error("credentials error: {message}")]
    Credentials { message: String },

    /// The wiki rejected our credentials (HTTP 401). Non-retryable.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure (connect, timeout, body read). Retryable.
    #[error("network error: {0}")]
    Network(String),

    /// The wiki API returned an unexpected status or payload. Retryable.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Response body could not be interpreted (JSON shape, missing fields).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Attachment text extraction failure (unsupported or corrupt input).
    #[error("extraction error: {0}")]
    Extract(String),

    /// Local database or image store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Settings validation error (probe query failed, bad filter combination).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, WikiSyncError>;

impl WikiSyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a credentials error from any displayable message.
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials {
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

    /// Whether the retry policy may re-attempt the failed call.
    ///
    /// Auth and credentials failures abort immediately; everything that is
    /// not a network/transient condition is a programming or data error and
    /// retrying would not help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::UnexpectedResponse(_))
    }
}
