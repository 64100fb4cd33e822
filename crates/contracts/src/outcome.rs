//! Stage outcomes and the run report
//!
//! Driver output. Every invocation in a run ends up as exactly one
//! [`StageOutcome`], in invocation order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{FailurePolicy, FlagSet, ParamFile, StageInvocation, StageName};

/// Terminal status of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageStatus {
    /// Exited with status 0
    Succeeded,
    /// Exited non-zero, or was killed by a signal
    Failed {
        exit_code: Option<i32>,
        signal: Option<i32>,
    },
    /// The program could not be started
    LaunchFailed { message: String },
    /// Killed after exceeding the stage timeout
    TimedOut { after_secs: u64 },
    /// Killed because the run was cancelled
    Cancelled,
    /// Never launched
    Skipped,
}

impl StageStatus {
    /// Whether this status counts against the failure policy
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed { .. } | Self::LaunchFailed { .. } | Self::TimedOut { .. }
        )
    }

    /// Whether a process launch was attempted
    pub fn was_invoked(&self) -> bool {
        !matches!(self, Self::Skipped)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed { .. } => "failed",
            Self::LaunchFailed { .. } => "launch_failed",
            Self::TimedOut { .. } => "timed_out",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

/// Result of one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    pub index: usize,
    pub stage: StageName,
    pub paramfile: ParamFile,
    pub flags: FlagSet,
    /// Full command line, empty when skipped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub argv: Vec<String>,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl StageOutcome {
    /// Outcome of a launched invocation
    pub fn finished(
        invocation: &StageInvocation,
        argv: Vec<String>,
        status: StageStatus,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            index: invocation.index,
            stage: invocation.stage.clone(),
            paramfile: invocation.paramfile.clone(),
            flags: invocation.flags.clone(),
            argv,
            status,
            started_at: Some(started_at),
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Outcome of an invocation that was never launched
    pub fn skipped(invocation: &StageInvocation) -> Self {
        Self {
            index: invocation.index,
            stage: invocation.stage.clone(),
            paramfile: invocation.paramfile.clone(),
            flags: invocation.flags.clone(),
            argv: Vec::new(),
            status: StageStatus::Skipped,
            started_at: None,
            duration_ms: 0,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Run lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Cancelled,
}

/// Aggregate report of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub state: RunState,
    pub policy: FailurePolicy,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcomes: Vec<StageOutcome>,
}

impl RunReport {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            state: RunState::Pending,
            policy,
            started_at: Utc::now(),
            duration_ms: 0,
            outcomes: Vec::new(),
        }
    }

    /// Number of failed invocations
    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Number of invocations that were launched
    pub fn invoked_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status.was_invoked())
            .count()
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == StageStatus::Succeeded)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.invoked_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failure())
    }

    pub fn first_failure(&self) -> Option<&StageOutcome> {
        self.failures().next()
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Succeeded
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}
