//! Error types for CLI operations.

use contracts::RunState;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Plan file not found
    #[error("Plan file not found: {path}")]
    PlanNotFound { path: String },

    /// Paramfiles referenced by the plan are missing on disk
    #[error("Paramfile(s) not found: {}", paths.join(", "))]
    ParamFilesMissing { paths: Vec<String> },

    /// The run finished but did not succeed
    #[error("Pipeline run {state}: {failures} stage(s) failed")]
    RunFailed { state: String, failures: usize },

    /// Report file could not be written
    #[error("Failed to write report to {path}: {source}")]
    ReportWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn plan_not_found(path: impl Into<String>) -> Self {
        Self::PlanNotFound { path: path.into() }
    }

    pub fn paramfiles_missing(paths: Vec<String>) -> Self {
        Self::ParamFilesMissing { paths }
    }

    pub fn run_failed(state: RunState, failures: usize) -> Self {
        let state = match state {
            RunState::Cancelled => "cancelled",
            RunState::Failed => "failed",
            RunState::Pending | RunState::InProgress => "incomplete",
            RunState::Succeeded => "succeeded",
        };
        Self::RunFailed {
            state: state.to_string(),
            failures,
        }
    }

    pub fn report_write(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::ReportWrite {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
