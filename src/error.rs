//! Error handling module for the installer
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Every step reports failure through these types; the sequencer turns them
//! into the diagnostic text of a failed step.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for the installer
#[derive(Error, Debug)]
pub enum InstallerError {
    /// Conflicting or missing operator input, detected before any step runs
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// An external program exited with a non-zero status
    #[error("Command `{program}` failed (exit code {code}): {diagnostic}")]
    Command {
        program: String,
        code: i32,
        diagnostic: String,
    },

    /// An external program could not be started at all
    #[error("Failed to execute `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem errors, always tied to the path involved
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template rendering errors (missing placeholder, bad syntax)
    #[error("Template error: {0}")]
    Template(String),

    /// Settings document parse/update errors
    #[error("Settings error: {0}")]
    Settings(String),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for installer operations
pub type Result<T> = std::result::Result<T, InstallerError>;

// Convenient error constructors
impl InstallerError {
    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a template error
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    /// Create a settings error
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an I/O error with the path it concerns
    pub fn fs(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True for errors raised before any step has run
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_) | Self::Config(_))
    }
}

/// Extension for attaching a path to `std::io::Result`.
pub trait IoResultExt<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| InstallerError::fs(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InstallerError::precondition("both roles selected");
        assert_eq!(err.to_string(), "Precondition failed: both roles selected");

        let err = InstallerError::Command {
            program: "dnf".to_string(),
            code: 1,
            diagnostic: "no match for argument".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Command `dnf` failed (exit code 1): no match for argument"
        );
    }

    #[test]
    fn test_io_error_carries_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Result<()> = Err(io_err).at_path("/etc/named");
        let msg = err.unwrap_err().to_string();
        assert!(msg.contains("/etc/named"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_precondition_classification() {
        assert!(InstallerError::precondition("x").is_precondition());
        assert!(InstallerError::config("x").is_precondition());
        assert!(!InstallerError::template("x").is_precondition());
    }
}
