//! Error types for Outliner.
//!
//! Library crates use [`OutlinerError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Outliner operations.
#[derive(Debug, thiserror::Error)]
pub enum OutlinerError {
    /// Configuration loading or validation error (prompt template, thresholds, modes).
    #[error("config error: {message}")]
    Config { message: String },

    /// Input data failed validation (e.g. an OCR page without exactly one `page_content`).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON or text parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// LLM call failed after the client exhausted every configured model.
    #[error("llm error: {0}")]
    Llm(String),

    /// HTTP transport error talking to an LLM backend.
    #[error("network error: {0}")]
    Network(String),

    /// Call-log store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OutlinerError>;

impl OutlinerError {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = OutlinerError::config("prompt template is missing {candidate_content}");
        assert_eq!(
            err.to_string(),
            "config error: prompt template is missing {candidate_content}"
        );

        let err = OutlinerError::validation("page 3 has 2 page_content entries");
        assert!(err.to_string().contains("page 3"));

        let err = OutlinerError::Llm("all models failed".into());
        assert_eq!(err.to_string(), "llm error: all models failed");
    }

    #[test]
    fn io_error_keeps_path() {
        let err = OutlinerError::io(
            "/tmp/missing.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/missing.json"));
    }
}
