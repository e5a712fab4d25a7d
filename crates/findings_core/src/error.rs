//! Error types for findings_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for findings_core operations.
#[derive(Error, Debug)]
pub enum FindingsError {
    /// I/O error during file operations.
    ///
    /// A failed log append surfaces here and is always fatal to the caller.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized or a whole-file document could not be parsed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error (loading, parsing, invalid values, limits).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// A value outside a closed enumeration was supplied.
    #[error("invalid {field} '{value}' (expected one of: {expected})")]
    InvalidValue {
        /// Name of the field being parsed
        field: &'static str,
        /// The rejected input
        value: String,
        /// Comma-separated accepted values
        expected: String,
    },

    /// The user's home directory could not be determined.
    #[error("could not determine home directory for the global findings store")]
    HomeDirNotFound,

    /// The advisory store lock could not be acquired.
    #[error("failed to lock {}: {}", path.display(), reason)]
    LockFailed {
        /// Path of the lock file
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// A record or repository with the given key does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl FindingsError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Io(_) => Some("Check disk space and permissions on the .findings directory."),
            Self::Serialization(_) => {
                Some("Run 'findings verify' to locate damaged records, then 'findings rebuild'.")
            }
            Self::ConfigError(_) => {
                Some("Fix or delete config.json in the global findings directory to restore defaults.")
            }
            Self::InvalidValue { .. } => Some("Run with --help to list the accepted values."),
            Self::HomeDirNotFound => {
                Some("Pass --global-dir or set FINDINGS_GLOBAL_DIR to choose a location.")
            }
            Self::LockFailed { .. } => {
                Some("Another findings process may be stuck; the lock is released when it exits.")
            }
            Self::NotFound(_) => Some("List known ids with 'findings search' or 'findings global search'."),
        }
    }
}

impl From<serde_json::Error> for FindingsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience Result type for findings_core operations.
pub type Result<T> = std::result::Result<T, FindingsError>;
