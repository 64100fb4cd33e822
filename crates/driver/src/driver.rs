//! Sequential pipeline driver
//!
//! Runs resolved invocations strictly one after another. Stage `i + 1` is
//! never started before stage `i` has exited, and with [`FailurePolicy::FailFast`]
//! nothing is started after the first failure.

use std::time::{Duration, Instant};

use chrono::Utc;
use contracts::{
    FailurePolicy, RunPlan, RunReport, RunState, StageInvocation, StageOutcome, StageStatus,
};
use observability::metrics::{record_run_report, record_stage_outcome, record_stage_started};
use tracing::{error, info, instrument, warn};

use crate::cancel::{CancelHandle, CancelToken};
use crate::error::{DriverError, Result};
use crate::launcher::StageLauncher;

/// Run options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverOptions {
    pub policy: FailurePolicy,
    /// Per-stage timeout (None = wait forever)
    pub stage_timeout: Option<Duration>,
}

impl DriverOptions {
    pub fn from_plan(plan: &RunPlan) -> Self {
        Self {
            policy: plan.failure_policy,
            stage_timeout: plan.stage_timeout(),
        }
    }

    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }
}

/// Pipeline driver
///
/// Owns the launcher and the cancellation handle for its runs.
///
/// # Example
///
/// ```ignore
/// let driver = PipelineDriver::new(ProcessLauncher::from_plan(&plan), DriverOptions::from_plan(&plan));
/// let report = driver.run_plan(&plan).await?;
/// assert!(report.is_success());
/// ```
pub struct PipelineDriver<L> {
    launcher: L,
    options: DriverOptions,
    cancel: CancelHandle,
}

impl<L: StageLauncher> PipelineDriver<L> {
    pub fn new(launcher: L, options: DriverOptions) -> Self {
        Self {
            launcher,
            options,
            cancel: CancelHandle::new(),
        }
    }

    /// Share an externally owned cancellation handle
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that cancels this driver's runs
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Command lines a run would execute, without running anything
    pub fn plan_only(&self, invocations: &[StageInvocation]) -> Vec<Vec<String>> {
        invocations
            .iter()
            .map(|inv| self.launcher.command_line(inv))
            .collect()
    }

    /// Resolve the plan and run it
    ///
    /// # Errors
    /// Only plan resolution errors; stage failures are reported in the
    /// returned [`RunReport`].
    pub async fn run_plan(&self, plan: &RunPlan) -> Result<RunReport> {
        let invocations = plan.resolve()?;
        Ok(self.run(&invocations).await)
    }

    /// Run invocations in order and report every one of them
    #[instrument(name = "pipeline_run", skip(self, invocations), fields(stages = invocations.len(), policy = %self.options.policy))]
    pub async fn run(&self, invocations: &[StageInvocation]) -> RunReport {
        let mut report = RunReport::new(self.options.policy);
        report.state = RunState::InProgress;
        let run_start = Instant::now();
        let token = self.cancel.token();

        let mut halted = false;
        let mut cancelled = false;

        for (position, invocation) in invocations.iter().enumerate() {
            if !halted && token.is_cancelled() {
                warn!("run cancelled before stage {}", invocation.label());
                halted = true;
                cancelled = true;
            }

            let outcome = if halted {
                StageOutcome::skipped(invocation)
            } else {
                self.run_stage(invocation, &token).await
            };
            record_stage_outcome(&outcome);

            match &outcome.status {
                StageStatus::Cancelled => {
                    halted = true;
                    cancelled = true;
                }
                status if status.is_failure() => {
                    if self.options.policy == FailurePolicy::FailFast {
                        warn!(
                            stage = %invocation.stage,
                            remaining = invocations.len() - position - 1,
                            "fail-fast: skipping remaining stages"
                        );
                        halted = true;
                    }
                }
                _ => {}
            }

            // Whatever the stage's own status, a fired token stops the run
            if !cancelled && outcome.status.was_invoked() && token.is_cancelled() {
                warn!("run cancelled during stage {}", invocation.label());
                halted = true;
                cancelled = true;
            }

            report.outcomes.push(outcome);
        }

        report.duration_ms = run_start.elapsed().as_millis() as u64;
        report.state = if cancelled {
            RunState::Cancelled
        } else if report.failure_count() > 0 {
            RunState::Failed
        } else {
            RunState::Succeeded
        };
        record_run_report(&report);

        info!(
            state = ?report.state,
            invoked = report.invoked_count(),
            failed = report.failure_count(),
            skipped = report.skipped_count(),
            duration_ms = report.duration_ms,
            "run finished"
        );

        report
    }

    async fn run_stage(&self, invocation: &StageInvocation, token: &CancelToken) -> StageOutcome {
        let argv = self.launcher.command_line(invocation);
        record_stage_started(invocation.stage.as_str());
        info!(
            index = invocation.index,
            stage = %invocation.stage,
            paramfile = %invocation.paramfile,
            command = %argv.join(" "),
            "launching stage"
        );

        let started_at = Utc::now();
        let start = Instant::now();
        let status = match self
            .launcher
            .launch(invocation, self.options.stage_timeout, token)
            .await
        {
            Ok(exit) => exit.into_status(),
            // Started, but the driver lost track of it
            Err(e @ DriverError::Wait { .. }) => {
                error!(stage = %invocation.stage, error = %e, "stage could not be waited on");
                StageStatus::Failed {
                    exit_code: None,
                    signal: None,
                }
            }
            Err(e) => {
                error!(stage = %invocation.stage, error = %e, "stage could not be launched");
                StageStatus::LaunchFailed {
                    message: e.to_string(),
                }
            }
        };
        let elapsed = start.elapsed();

        // A stage that dies while the run is being cancelled went down with it,
        // usually from the same Ctrl+C.
        let status = if token.is_cancelled()
            && matches!(
                status,
                StageStatus::Failed { .. } | StageStatus::TimedOut { .. }
            ) {
            warn!(stage = %invocation.stage, ?status, "stage ended during cancellation");
            StageStatus::Cancelled
        } else {
            status
        };

        match &status {
            StageStatus::Succeeded => {
                info!(stage = %invocation.stage, elapsed_ms = elapsed.as_millis() as u64, "stage succeeded")
            }
            StageStatus::Failed { exit_code, signal } => {
                error!(stage = %invocation.stage, ?exit_code, ?signal, "stage failed")
            }
            StageStatus::TimedOut { after_secs } => {
                error!(stage = %invocation.stage, after_secs, "stage timed out")
            }
            _ => {}
        }

        StageOutcome::finished(invocation, argv, status, started_at, elapsed)
    }
}
