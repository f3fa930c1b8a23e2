//! Error types and exit codes for ontoindex

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for ontoindex operations
#[derive(Error, Debug)]
pub enum OntoError {
    #[error("Project root not found: {path}")]
    ProjectNotFound { path: String },

    #[error("Not a directory: {path}")]
    NotADirectory { path: String },

    #[error("Failed to parse file: {message}")]
    ParseFailure { message: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OntoError {
    /// Convert error to the CLI exit code:
    /// - 0: Success
    /// - 1: Project not found / IO error
    /// - 2: Invalid configuration
    /// - 3: Parse failure
    /// - 4: Cache failure
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::ProjectNotFound { .. } | Self::NotADirectory { .. } => ExitCode::from(1),
            Self::Io(_) => ExitCode::from(1),
            Self::Config { .. } => ExitCode::from(2),
            Self::ParseFailure { .. } => ExitCode::from(3),
            Self::Cache { .. } | Self::Json(_) => ExitCode::from(4),
        }
    }
}

/// Result type alias for ontoindex operations
pub type Result<T> = std::result::Result<T, OntoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let missing = OntoError::ProjectNotFound { path: "x".into() };
        assert_eq!(missing.exit_code(), ExitCode::from(1));
        let config = OntoError::Config { message: "bad".into() };
        assert_eq!(config.exit_code(), ExitCode::from(2));
        let cache = OntoError::Cache { message: "disk full".into() };
        assert_eq!(cache.exit_code(), ExitCode::from(4));
        assert_eq!(cache.to_string(), "Cache error: disk full");
    }
}
