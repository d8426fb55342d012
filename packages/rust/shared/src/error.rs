//! Error types for mdigest.
//!
//! Library crates use [`DigestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all mdigest operations.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// Configuration loading or validation error. Aborts initialization.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to an external collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// A single source item could not be turned into Markdown.
    #[error("generation error for {identifier}: {message}")]
    Generation { identifier: String, message: String },

    /// No source item produced any content.
    #[error("no content was produced for any of the {total} source items")]
    EmptyResult { total: usize },

    /// The rendering backend failed on a well-formed document.
    #[error("render error: {0}")]
    Render(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad input list, malformed response, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DigestError>;

impl DigestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a per-item generation error.
    pub fn generation(identifier: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Generation {
            identifier: identifier.into(),
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

    /// Whether this error only affects a single item and the run may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Generation { .. } | Self::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DigestError::config("batch_size must be at least 1");
        assert_eq!(err.to_string(), "config error: batch_size must be at least 1");

        let err = DigestError::generation("https://example.com/a", "HTTP 429");
        assert_eq!(
            err.to_string(),
            "generation error for https://example.com/a: HTTP 429"
        );

        let err = DigestError::EmptyResult { total: 3 };
        assert!(err.to_string().contains("3 source items"));
    }

    #[test]
    fn item_errors_are_recoverable() {
        assert!(DigestError::generation("u1", "boom").is_recoverable());
        assert!(DigestError::Network("timeout".into()).is_recoverable());
        assert!(!DigestError::EmptyResult { total: 1 }.is_recoverable());
        assert!(!DigestError::config("bad").is_recoverable());
    }
}
