//! Error types for AssetForge.
//!
//! Library crates use [`AssetForgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all AssetForge operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetForgeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Markup rendering error (contact tables, sequences, markup blocks).
    #[error("render error: {0}")]
    Render(String),

    /// Content enhancement error for a single asset group.
    #[error("enhancement error: {0}")]
    Enhancement(String),

    /// Unified asset assembly error for a single asset group.
    #[error("assembly error: {0}")]
    Assembly(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (malformed snapshot, missing fields, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AssetForgeError>;

impl AssetForgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a render error from any displayable message.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
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

impl From<serde_json::Error> for AssetForgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = AssetForgeError::config("missing database path");
        assert_eq!(err.to_string(), "config error: missing database path");

        let err = AssetForgeError::render("contact table has no rows");
        assert!(err.to_string().starts_with("render error:"));

        let err = AssetForgeError::validation("snapshot has no workspace");
        assert!(err.to_string().contains("snapshot has no workspace"));
    }

    #[test]
    fn serde_errors_convert() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: AssetForgeError = parse.unwrap_err().into();
        assert!(matches!(err, AssetForgeError::Serialization(_)));
    }
}
