//! Error types for Switchboard

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Switchboard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Switchboard operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No routing configuration exists at the resolved path
    #[error("Routing config not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// Routing configuration exists but is structurally invalid
    #[error("Failed to parse routing config {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// A glob or regex in a specialist's triggers does not compile
    #[error("Invalid pattern {pattern:?} for specialist '{specialist}': {message}")]
    InvalidPattern {
        specialist: String,
        pattern: String,
        message: String,
    },

    /// A persisted state file is unreadable or not valid JSON
    #[error("State file {} is corrupt: {message}", path.display())]
    StateCorrupt { path: PathBuf, message: String },

    /// Tool settings error (settings.toml, env overrides)
    #[error("Settings error: {0}")]
    Settings(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error comes from loading the routing rules.
    ///
    /// These are the only failures allowed to reach the host as a diagnostic.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound(_) | Error::ConfigParse { .. } | Error::InvalidPattern { .. }
        )
    }
}
