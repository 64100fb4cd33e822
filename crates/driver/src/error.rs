//! Driver error types

use std::io;

use contracts::ContractError;
use thiserror::Error;

/// Driver specific error
#[derive(Debug, Error)]
pub enum DriverError {
    /// The stage program could not be started
    #[error("failed to spawn stage '{stage}' ({program}): {source}")]
    Spawn {
        stage: String,
        program: String,
        #[source]
        source: io::Error,
    },

    /// Waiting on or killing the child failed
    #[error("failed while waiting for stage '{stage}': {source}")]
    Wait {
        stage: String,
        #[source]
        source: io::Error,
    },

    /// Stage log file could not be opened
    #[error("failed to open stage log {path}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl DriverError {
    /// Create spawn error
    pub fn spawn(stage: impl Into<String>, program: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            stage: stage.into(),
            program: program.into(),
            source,
        }
    }

    /// Create wait error
    pub fn wait(stage: impl Into<String>, source: io::Error) -> Self {
        Self::Wait {
            stage: stage.into(),
            source,
        }
    }

    /// Create log file error
    pub fn log_file(path: impl Into<String>, source: io::Error) -> Self {
        Self::LogFile {
            path: path.into(),
            source,
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, DriverError>;
