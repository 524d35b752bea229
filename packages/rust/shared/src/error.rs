//! Error types for bookforge.
//!
//! Library crates use [`BookForgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all bookforge operations.
#[derive(Debug, thiserror::Error)]
pub enum BookForgeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Every strategy for a format failed.
    #[error("conversion error ({format}): {message}")]
    Conversion { format: String, message: String },

    /// An external process could not be spawned or awaited.
    #[error("process error: {0}")]
    Process(String),

    /// An external process exceeded its time budget.
    #[error("`{program}` timed out after {}s", elapsed.as_secs())]
    Timeout { program: String, elapsed: Duration },

    /// Data validation error (invalid project layout, bad option, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BookForgeError>;

impl BookForgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a conversion error for the given format.
    pub fn conversion(format: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Conversion {
            format: format.into(),
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
        let err = BookForgeError::config("unreadable book.toml");
        assert_eq!(err.to_string(), "config error: unreadable book.toml");

        let err = BookForgeError::conversion("pdf", "pandoc exited with status 43");
        assert_eq!(
            err.to_string(),
            "conversion error (pdf): pandoc exited with status 43"
        );
    }

    #[test]
    fn timeout_display_uses_seconds() {
        let err = BookForgeError::Timeout {
            program: "kindlegen".into(),
            elapsed: Duration::from_millis(90_500),
        };
        assert_eq!(err.to_string(), "`kindlegen` timed out after 90s");
    }
}
