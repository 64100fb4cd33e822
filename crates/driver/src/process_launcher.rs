//! Child-process launcher
//!
//! Runs each stage as `<command...> <program> <config_arg> <paramfile> [flags] [extra_args]`
//! through `tokio::process`. The child is created with `kill_on_drop`, so
//! it is released on every exit path, including the launch future being
//! dropped mid-wait.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use contracts::{LauncherConfig, RunPlan, StageCatalogEntry, StageInvocation, StageName};
use tokio::process::{Child, Command};
use tracing::{debug, instrument, warn};

use crate::cancel::CancelToken;
use crate::error::{DriverError, Result};
use crate::launcher::{StageExit, StageLauncher};

/// Launches stages as real child processes
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    config: LauncherConfig,
    catalog: HashMap<StageName, StageCatalogEntry>,
}

/// What ended the wait on a child
enum Waited {
    Exited(std::io::Result<ExitStatus>),
    TimedOut(Duration),
    Cancelled,
}

impl ProcessLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        Self {
            config,
            catalog: HashMap::new(),
        }
    }

    /// Launcher configured from a plan's `[launcher]` and `[stages]` tables
    pub fn from_plan(plan: &RunPlan) -> Self {
        Self {
            config: plan.launcher.clone(),
            catalog: plan.stages.clone(),
        }
    }

    pub fn with_catalog(mut self, catalog: HashMap<StageName, StageCatalogEntry>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Program path for a stage
    ///
    /// An explicit catalog `program` wins; otherwise
    /// `<stage_dir>/<stage><extension>`.
    pub fn program_path(&self, stage: &StageName) -> PathBuf {
        if let Some(program) = self
            .catalog
            .get(stage.as_str())
            .and_then(|entry| entry.program.as_ref())
        {
            return program.clone();
        }
        self.config
            .stage_dir
            .join(format!("{}{}", stage, self.config.extension))
    }

    fn build_command(&self, argv: &[String]) -> Option<Command> {
        let (program, args) = argv.split_first()?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        Some(cmd)
    }

    /// Redirect stdout/stderr into `<log_dir>/<label>.log`
    fn attach_log(&self, cmd: &mut Command, log_dir: &Path, label: &str) -> Result<PathBuf> {
        let path = log_dir.join(format!("{label}.log"));
        let display = path.display().to_string();

        std::fs::create_dir_all(log_dir)
            .map_err(|e| DriverError::log_file(log_dir.display().to_string(), e))?;
        let stdout = File::create(&path).map_err(|e| DriverError::log_file(&display, e))?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| DriverError::log_file(&display, e))?;

        cmd.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));
        Ok(path)
    }
}

impl StageLauncher for ProcessLauncher {
    fn command_line(&self, invocation: &StageInvocation) -> Vec<String> {
        let mut argv: Vec<String> = self.config.command.clone();
        argv.push(
            self.program_path(&invocation.stage)
                .display()
                .to_string(),
        );
        argv.extend(invocation.stage_args(&self.config.config_arg));
        argv.extend(self.config.extra_args.iter().cloned());
        argv
    }

    #[instrument(
        name = "process_launcher_launch",
        skip(self, invocation, cancel),
        fields(index = invocation.index, stage = %invocation.stage)
    )]
    async fn launch(
        &self,
        invocation: &StageInvocation,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<StageExit> {
        let argv = self.command_line(invocation);
        let program = argv.first().cloned().unwrap_or_default();
        let mut cmd = self.build_command(&argv).ok_or_else(|| {
            DriverError::spawn(
                invocation.stage.as_str(),
                &program,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line"),
            )
        })?;

        if let Some(log_dir) = &self.config.log_dir {
            let path = self.attach_log(&mut cmd, log_dir, &invocation.label())?;
            debug!(log = %path.display(), "stage output redirected");
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| DriverError::spawn(invocation.stage.as_str(), &program, e))?;
        debug!(pid = ?child.id(), "stage spawned");

        let waited = tokio::select! {
            biased;
            _ = cancel.cancelled() => Waited::Cancelled,
            waited = wait_with_timeout(&mut child, timeout) => waited,
        };

        match waited {
            Waited::Exited(status) => {
                let status = status.map_err(|e| DriverError::wait(invocation.stage.as_str(), e))?;
                Ok(StageExit::Exited {
                    code: status.code(),
                    signal: exit_signal(&status),
                })
            }
            Waited::TimedOut(after) => {
                warn!(timeout_ms = after.as_millis() as u64, "stage timed out, killing");
                kill_child(&mut child).await;
                Ok(StageExit::TimedOut { after })
            }
            Waited::Cancelled => {
                warn!("run cancelled, killing stage");
                kill_child(&mut child).await;
                Ok(StageExit::Cancelled)
            }
        }
    }
}

async fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> Waited {
    match timeout {
        Some(after) => match tokio::time::timeout(after, child.wait()).await {
            Ok(status) => Waited::Exited(status),
            Err(_) => Waited::TimedOut(after),
        },
        None => Waited::Exited(child.wait().await),
    }
}

/// Kill and reap
///
/// A failed kill does not change why the stage was stopped; `kill_on_drop`
/// still fires when the child handle goes away.
async fn kill_child(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!(pid = ?child.id(), error = %e, "failed to kill stage");
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
