//! Recording launcher for tests and dry runs
//!
//! Never spawns anything. Records every invocation it is asked to run and
//! answers with a configured exit.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use contracts::{StageInvocation, StageName};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{DriverError, Result};
use crate::launcher::{StageExit, StageLauncher};

/// Mock launcher behaviour
#[derive(Debug, Clone, Default)]
pub struct MockLauncherConfig {
    /// Invocation indices that exit with `exit_code`
    pub fail_indices: HashSet<usize>,
    /// Stages that always exit with `exit_code`
    pub fail_stages: HashSet<StageName>,
    /// Exit code used for failures (0 is mapped to 1)
    pub exit_code: i32,
    /// Stages whose launch returns a spawn error
    pub unlaunchable_stages: HashSet<StageName>,
    /// Invocation indices that block until timeout or cancellation
    pub hang_indices: HashSet<usize>,
}

impl MockLauncherConfig {
    pub fn fail_at(mut self, index: usize) -> Self {
        self.fail_indices.insert(index);
        self
    }

    pub fn fail_stage(mut self, stage: impl Into<StageName>) -> Self {
        self.fail_stages.insert(stage.into());
        self
    }

    pub fn unlaunchable(mut self, stage: impl Into<StageName>) -> Self {
        self.unlaunchable_stages.insert(stage.into());
        self
    }

    pub fn hang_at(mut self, index: usize) -> Self {
        self.hang_indices.insert(index);
        self
    }

    fn failure_code(&self) -> i32 {
        if self.exit_code == 0 {
            1
        } else {
            self.exit_code
        }
    }
}

/// Launcher that records invocations instead of running them
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    config: MockLauncherConfig,
    calls: Mutex<Vec<StageInvocation>>,
}

impl RecordingLauncher {
    /// Launcher where every stage succeeds
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MockLauncherConfig) -> Self {
        Self {
            config,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Invocations launched so far, in launch order
    pub fn invocations(&self) -> Vec<StageInvocation> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn record(&self, invocation: &StageInvocation) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invocation.clone());
    }

    async fn hang(timeout: Option<Duration>, cancel: &CancelToken) -> StageExit {
        match timeout {
            Some(after) => tokio::select! {
                _ = tokio::time::sleep(after) => StageExit::TimedOut { after },
                _ = cancel.cancelled() => StageExit::Cancelled,
            },
            None => {
                cancel.cancelled().await;
                StageExit::Cancelled
            }
        }
    }
}

impl StageLauncher for RecordingLauncher {
    fn command_line(&self, invocation: &StageInvocation) -> Vec<String> {
        let mut argv = vec![invocation.stage.to_string()];
        argv.extend(invocation.stage_args("--globals"));
        argv
    }

    async fn launch(
        &self,
        invocation: &StageInvocation,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<StageExit> {
        if self.config.unlaunchable_stages.contains(&invocation.stage) {
            return Err(DriverError::spawn(
                invocation.stage.as_str(),
                invocation.stage.as_str(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "mock: program not found"),
            ));
        }

        self.record(invocation);
        debug!(index = invocation.index, stage = %invocation.stage, "mock launch");

        if self.config.hang_indices.contains(&invocation.index) {
            return Ok(Self::hang(timeout, cancel).await);
        }

        let fails = self.config.fail_indices.contains(&invocation.index)
            || self.config.fail_stages.contains(&invocation.stage);
        if fails {
            Ok(StageExit::code(self.config.failure_code()))
        } else {
            Ok(StageExit::code(0))
        }
    }
}
