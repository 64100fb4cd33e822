//! Pipeline orchestrator - wires the plan, the process launcher and the
//! shutdown signal together.

use std::time::Instant;

use anyhow::{Context, Result};
use contracts::RunPlan;
use driver::{DriverOptions, PipelineDriver, ProcessLauncher};
use tracing::{info, warn};

use super::RunStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated plan, CLI overrides already applied
    pub plan: RunPlan,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline to completion
    ///
    /// Ctrl+C / SIGTERM cancel the run: the running stage is killed and the
    /// report is still returned.
    pub async fn run(self) -> Result<RunStats> {
        let start_time = Instant::now();
        let plan = &self.config.plan;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let invocations = plan.resolve().context("Failed to resolve plan")?;
        let driver = PipelineDriver::new(
            ProcessLauncher::from_plan(plan),
            DriverOptions::from_plan(plan),
        );

        let cancel = driver.cancel_handle();
        let shutdown = tokio::spawn(async move {
            shutdown_signal().await;
            warn!("Received shutdown signal, cancelling run...");
            cancel.cancel();
        });

        info!(
            stages = invocations.len(),
            policy = %plan.failure_policy,
            "Starting pipeline..."
        );
        let report = driver.run(&invocations).await;
        shutdown.abort();

        Ok(RunStats::new(report, start_time.elapsed()))
    }
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
