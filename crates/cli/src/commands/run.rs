//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::PlanLoader;
use contracts::{FailurePolicy, ParamFile, RunPlan, RunReport};
use driver::{DriverOptions, PipelineDriver, ProcessLauncher};
use std::path::Path;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(plan = %args.plan.display(), "Loading plan");

    if !args.plan.exists() {
        return Err(CliError::plan_not_found(args.plan.display().to_string()).into());
    }

    let mut plan = PlanLoader::load_from_path(&args.plan)
        .with_context(|| format!("Failed to load plan from {}", args.plan.display()))?;

    apply_overrides(&mut plan, args);
    PlanLoader::validate(&plan).context("Plan is invalid after applying CLI overrides")?;

    info!(
        policy = %plan.failure_policy,
        stages = plan.stage_steps().count(),
        paramfiles = plan.paramfiles().len(),
        "Plan loaded"
    );

    // Dry run - print the command lines and exit
    if args.dry_run {
        info!("Dry run mode - nothing will be launched");
        print_dry_run(&plan)?;
        return Ok(());
    }

    check_paramfiles(&plan)?;

    let pipeline = Pipeline::new(PipelineConfig {
        plan,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    });
    let stats = pipeline.run().await.context("Pipeline execution failed")?;

    stats.print_summary();

    if let Some(ref path) = args.report {
        write_report(&stats.report, path)?;
        info!(path = %path.display(), "Run report written");
    }

    if !stats.report.is_success() {
        return Err(CliError::run_failed(stats.report.state, stats.report.failure_count()).into());
    }

    info!("Pipeline Driver finished");
    Ok(())
}

/// Apply CLI overrides on top of the plan file
fn apply_overrides(plan: &mut RunPlan, args: &RunArgs) {
    if args.continue_on_failure {
        info!("Overriding failure policy from CLI: continue_on_failure");
        plan.failure_policy = FailurePolicy::ContinueOnFailure;
    } else if args.fail_fast {
        info!("Overriding failure policy from CLI: fail_fast");
        plan.failure_policy = FailurePolicy::FailFast;
    }

    if let Some(secs) = args.stage_timeout {
        info!(secs, "Overriding stage timeout from CLI");
        plan.stage_timeout_secs = secs;
    }

    if let Some(ref paramfile) = args.paramfile {
        info!(paramfile = %paramfile.display(), "Overriding initial paramfile from CLI");
        plan.override_initial_paramfile(ParamFile::new(paramfile));
    }

    if let Some(ref log_dir) = args.log_dir {
        plan.launcher.log_dir = Some(log_dir.clone());
    }
}

/// Refuse to start when a paramfile is missing
///
/// Relative paths are resolved against the launcher's working directory
/// when one is configured, since that is where the stages will look.
fn check_paramfiles(plan: &RunPlan) -> crate::error::Result<()> {
    let missing: Vec<String> = plan
        .paramfiles()
        .into_iter()
        .filter(|p| !paramfile_exists(plan, p))
        .map(|p| p.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CliError::paramfiles_missing(missing))
    }
}

fn paramfile_exists(plan: &RunPlan, paramfile: &ParamFile) -> bool {
    match &plan.launcher.working_dir {
        Some(dir) if paramfile.path().is_relative() => dir.join(paramfile.path()).is_file(),
        _ => paramfile.exists(),
    }
}

fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    std::fs::write(path, json)
        .map_err(|e| CliError::report_write(path.display().to_string(), e))?;
    Ok(())
}

/// Print invocation list for dry-run mode
fn print_dry_run(plan: &RunPlan) -> Result<()> {
    let invocations = plan.resolve().context("Failed to resolve plan")?;
    let driver = PipelineDriver::new(
        ProcessLauncher::from_plan(plan),
        DriverOptions::from_plan(plan),
    );

    println!("\n=== Dry Run ({}) ===\n", plan.failure_policy);
    for (invocation, argv) in invocations.iter().zip(driver.plan_only(&invocations)) {
        println!("  [{:02}] {}", invocation.index, argv.join(" "));
    }

    for paramfile in plan.paramfiles() {
        if !paramfile_exists(plan, paramfile) {
            warn!(paramfile = %paramfile, "Paramfile does not exist");
        }
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{PipelineStep, StageFlag};
    use std::path::PathBuf;

    fn args() -> RunArgs {
        RunArgs {
            plan: PathBuf::from("plan.toml"),
            continue_on_failure: false,
            fail_fast: false,
            stage_timeout: None,
            paramfile: None,
            dry_run: false,
            report: None,
            log_dir: None,
            metrics_port: 0,
        }
    }

    fn plan() -> RunPlan {
        RunPlan::builder()
            .failure_policy(FailurePolicy::FailFast)
            .paramfile("A.yaml")
            .stage("mocker", [StageFlag::Sims])
            .paramfile("B.yaml")
            .stage("coadder", [StageFlag::Data])
            .build()
    }

    #[test]
    fn test_no_overrides_keeps_plan() {
        let mut plan = plan();
        apply_overrides(&mut plan, &args());
        assert_eq!(plan.failure_policy, FailurePolicy::FailFast);
        assert_eq!(plan.stage_timeout_secs, 0);
        assert!(plan.launcher.log_dir.is_none());
    }

    #[test]
    fn test_overrides_applied() {
        let mut plan = plan();
        let args = RunArgs {
            continue_on_failure: true,
            stage_timeout: Some(60),
            paramfile: Some(PathBuf::from("C.yaml")),
            log_dir: Some(PathBuf::from("logs")),
            ..args()
        };
        apply_overrides(&mut plan, &args);

        assert_eq!(plan.failure_policy, FailurePolicy::ContinueOnFailure);
        assert_eq!(plan.stage_timeout_secs, 60);
        assert_eq!(plan.launcher.log_dir, Some(PathBuf::from("logs")));

        // Only the first selection is replaced
        let paramfiles: Vec<String> = plan.paramfiles().iter().map(|p| p.to_string()).collect();
        assert_eq!(paramfiles, vec!["C.yaml", "B.yaml"]);
        assert!(matches!(plan.steps[0], PipelineStep::UseParamFile(_)));
    }

    #[test]
    fn test_check_paramfiles() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("paramfile_SAT.yaml");
        std::fs::write(&present, "output_dir: out\n").unwrap();

        let plan = RunPlan::builder()
            .paramfile(present.clone())
            .stage("mocker", [])
            .build();
        assert!(check_paramfiles(&plan).is_ok());

        let plan = RunPlan::builder()
            .paramfile(present)
            .stage("mocker", [])
            .paramfile(dir.path().join("missing.yaml"))
            .stage("mcmer", [])
            .build();
        let err = check_paramfiles(&plan).unwrap_err().to_string();
        assert!(err.contains("missing.yaml"), "got: {err}");
        assert!(!err.contains("paramfile_SAT.yaml"), "got: {err}");
    }

    #[test]
    fn test_relative_paramfile_uses_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("paramfiles")).unwrap();
        std::fs::write(dir.path().join("paramfiles/A.yaml"), "").unwrap();

        let mut plan = RunPlan::builder()
            .paramfile("paramfiles/A.yaml")
            .stage("mocker", [])
            .build();
        plan.launcher.working_dir = Some(dir.path().to_path_buf());
        assert!(check_paramfiles(&plan).is_ok());
    }

    #[test]
    fn test_directory_is_not_a_paramfile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("paramfiles")).unwrap();

        // Same answer with and without a working dir
        let mut plan = RunPlan::builder()
            .paramfile("paramfiles")
            .stage("mocker", [])
            .build();
        plan.launcher.working_dir = Some(dir.path().to_path_buf());
        assert!(check_paramfiles(&plan).is_err());

        let plan = RunPlan::builder()
            .paramfile(dir.path().join("paramfiles"))
            .stage("mocker", [])
            .build();
        assert!(check_paramfiles(&plan).is_err());
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = RunReport::new(FailurePolicy::ContinueOnFailure);

        write_report(&report, &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["policy"], "continue_on_failure");
        assert_eq!(value["state"], "pending");
    }
}
