//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::RunPlan;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    plan_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<PlanSummary>,
}

#[derive(Serialize)]
struct PlanSummary {
    version: String,
    failure_policy: String,
    stage_timeout_secs: u64,
    invocation_count: usize,
    paramfile_count: usize,
    stages: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(plan = %args.plan.display(), "Validating plan");

    let result = validate_plan(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Plan validation failed")
    }
}

fn validate_plan(args: &ValidateArgs) -> ValidationResult {
    let plan_path = args.plan.display().to_string();

    // Check file exists
    if !args.plan.exists() {
        return ValidationResult {
            valid: false,
            plan_path,
            error: Some(format!("File not found: {}", args.plan.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::PlanLoader::load_from_path(&args.plan) {
        Ok(plan) => {
            let warnings = collect_warnings(&plan);
            let stages: BTreeSet<String> =
                plan.stage_steps().map(|s| s.stage.to_string()).collect();

            ValidationResult {
                valid: true,
                plan_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(PlanSummary {
                    version: format!("{:?}", plan.version),
                    failure_policy: plan.failure_policy.to_string(),
                    stage_timeout_secs: plan.stage_timeout_secs,
                    invocation_count: plan.stage_steps().count(),
                    paramfile_count: plan.paramfiles().len(),
                    stages: stages.into_iter().collect(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            plan_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect plan warnings (non-fatal issues)
fn collect_warnings(plan: &RunPlan) -> Vec<String> {
    let mut warnings = Vec::new();

    // Stages outside the known set need a catalog entry or a matching program
    let mut reported = BTreeSet::new();
    for step in plan.stage_steps() {
        let name = step.stage.as_str();
        if !step.stage.is_known() && !plan.stages.contains_key(name) && reported.insert(name) {
            warnings.push(format!("Stage '{}' is not a known pipeline stage", name));
        }
    }

    // Catalog entries never used
    let used: BTreeSet<&str> = plan.stage_steps().map(|s| s.stage.as_str()).collect();
    let mut unused: Vec<&str> = plan
        .stages
        .keys()
        .map(|k| k.as_str())
        .filter(|k| !used.contains(k))
        .collect();
    unused.sort_unstable();
    for name in unused {
        warnings.push(format!("Catalog entry '{}' is never invoked", name));
    }

    // Paramfiles must exist by the time the plan is run
    for paramfile in plan.paramfiles() {
        if !paramfile.exists() {
            warnings.push(format!("Paramfile '{}' does not exist", paramfile));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Plan is valid: {}", result.plan_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Failure policy: {}", summary.failure_policy);
            println!("  Invocations: {}", summary.invocation_count);
            println!("  Paramfiles: {}", summary.paramfile_count);
            println!("  Stages: {}", summary.stages.join(", "));
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Plan is invalid: {}", result.plan_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
