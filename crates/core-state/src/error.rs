//! Error types for deployment state operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for state operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or mutating deployment state
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Environment file does not exist
    #[error("Environment \"{name}\" does not exist ({path})")]
    EnvironmentNotFound { name: String, path: PathBuf },

    /// Environment file already exists
    #[error("Environment \"{name}\" already exists")]
    EnvironmentExists { name: String },

    /// Operation is not allowed on the active environment
    #[error("Environment \"{name}\" is the active environment")]
    EnvironmentActive { name: String },

    /// No environment is marked active
    #[error("No active environment found")]
    NoActiveEnvironment,

    /// Environment file exists but fails schema validation
    #[error("Environment \"{name}\" has invalid file structure ({path}): {message}")]
    Corrupt {
        name: String,
        path: PathBuf,
        message: String,
    },

    /// Environment name cannot be mapped to a state file
    #[error("Invalid environment name: {0:?}")]
    InvalidEnvironmentName(String),

    /// Schema could not be compiled
    #[error("Schema error: {0}")]
    Schema(String),
}

impl Error {
    /// Create an environment-not-found error
    pub fn environment_not_found<S: Into<String>, P: Into<PathBuf>>(name: S, path: P) -> Self {
        Error::EnvironmentNotFound {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Create a corrupt-environment error
    pub fn corrupt<S: Into<String>, P: Into<PathBuf>, M: Into<String>>(
        name: S,
        path: P,
        message: M,
    ) -> Self {
        Error::Corrupt {
            name: name.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the operator should repair the file rather than initialise it
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::Corrupt { .. })
    }

    /// Whether the error names something that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::EnvironmentNotFound { .. } | Error::NoActiveEnvironment
        )
    }
}
