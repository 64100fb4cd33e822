//! Stage launcher abstraction
//!
//! Defines the seam between the driver loop and whatever actually runs a
//! stage: real child processes in production, a recording mock in tests.

use std::time::Duration;

use contracts::{StageInvocation, StageStatus};

use crate::cancel::CancelToken;
use crate::error::Result;

/// How a launched stage ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageExit {
    /// The program exited on its own (or was killed by an outside signal)
    Exited {
        code: Option<i32>,
        signal: Option<i32>,
    },
    /// Killed by the launcher after the stage timeout
    TimedOut { after: Duration },
    /// Killed by the launcher because the run was cancelled
    Cancelled,
}

impl StageExit {
    /// Normal exit with the given code
    pub fn code(code: i32) -> Self {
        Self::Exited {
            code: Some(code),
            signal: None,
        }
    }

    /// Map to the reported status; only exit code 0 is success
    pub fn into_status(self) -> StageStatus {
        match self {
            Self::Exited {
                code: Some(0),
                signal: None,
            } => StageStatus::Succeeded,
            Self::Exited { code, signal } => StageStatus::Failed {
                exit_code: code,
                signal,
            },
            // rounded up so a sub-second timeout never reports 0
            Self::TimedOut { after } => StageStatus::TimedOut {
                after_secs: after.as_secs() + u64::from(after.subsec_nanos() > 0),
            },
            Self::Cancelled => StageStatus::Cancelled,
        }
    }
}

/// Stage launcher trait
///
/// `launch` runs one invocation to completion. Implementations must not
/// leave the stage running when the returned future completes or is
/// dropped.
#[trait_variant::make(StageLauncher: Send)]
pub trait LocalStageLauncher {
    /// Full command line `launch` would execute, for reports and dry runs
    fn command_line(&self, invocation: &StageInvocation) -> Vec<String>;

    /// Run the invocation and wait for it
    ///
    /// # Arguments
    /// * `timeout` - kill the stage after this long
    /// * `cancel` - kill the stage when cancellation fires
    ///
    /// # Errors
    /// Returns an error when the stage could not be started or waited on
    async fn launch(
        &self,
        invocation: &StageInvocation,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<StageExit>;
}
