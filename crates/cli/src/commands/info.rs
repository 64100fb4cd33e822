//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{RunPlan, StageInvocation};
use driver::{ProcessLauncher, StageLauncher};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::cli::InfoArgs;

/// Plan info for JSON output
#[derive(Serialize)]
struct PlanInfo {
    version: String,
    failure_policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage_timeout_secs: Option<u64>,
    launcher: LauncherInfo,
    paramfiles: Vec<String>,
    invocations: Vec<InvocationInfo>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    catalog: BTreeMap<String, CatalogInfo>,
}

#[derive(Serialize)]
struct LauncherInfo {
    command: Vec<String>,
    stage_dir: String,
    extension: String,
    config_arg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    working_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
}

#[derive(Serialize)]
struct InvocationInfo {
    index: usize,
    stage: String,
    paramfile: String,
    flags: Vec<String>,
    argv: Vec<String>,
}

#[derive(Serialize)]
struct CatalogInfo {
    program: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    accepts: Option<Vec<String>>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(plan = %args.plan.display(), "Loading plan info");

    if !args.plan.exists() {
        anyhow::bail!("Plan file not found: {}", args.plan.display());
    }

    let plan = config_loader::PlanLoader::load_from_path(&args.plan)
        .with_context(|| format!("Failed to load plan from {}", args.plan.display()))?;
    let invocations = plan.resolve().context("Failed to resolve plan")?;
    let launcher = ProcessLauncher::from_plan(&plan);

    if args.json {
        let info = build_plan_info(&plan, &invocations, &launcher, args);
        let json = serde_json::to_string_pretty(&info).context("Failed to serialize plan info")?;
        println!("{}", json);
    } else {
        print_plan_info(&plan, &invocations, &launcher, args);
    }

    Ok(())
}

fn build_plan_info(
    plan: &RunPlan,
    invocations: &[StageInvocation],
    launcher: &ProcessLauncher,
    args: &InfoArgs,
) -> PlanInfo {
    let invocations = invocations
        .iter()
        .map(|inv| InvocationInfo {
            index: inv.index,
            stage: inv.stage.to_string(),
            paramfile: inv.paramfile.to_string(),
            flags: inv.flag_args().into_iter().map(str::to_string).collect(),
            argv: launcher.command_line(inv),
        })
        .collect();

    let catalog = if args.catalog {
        plan.stages
            .iter()
            .map(|(name, entry)| {
                (
                    name.to_string(),
                    CatalogInfo {
                        program: launcher.program_path(name).display().to_string(),
                        accepts: entry
                            .accepts
                            .as_ref()
                            .map(|flags| flags.iter().map(|f| f.to_string()).collect()),
                    },
                )
            })
            .collect()
    } else {
        BTreeMap::new()
    };

    let config = &plan.launcher;
    PlanInfo {
        version: format!("{:?}", plan.version),
        failure_policy: plan.failure_policy.to_string(),
        stage_timeout_secs: plan.stage_timeout().map(|t| t.as_secs()),
        launcher: LauncherInfo {
            command: config.command.clone(),
            stage_dir: config.stage_dir.display().to_string(),
            extension: config.extension.clone(),
            config_arg: config.config_arg.clone(),
            working_dir: config.working_dir.as_ref().map(|d| d.display().to_string()),
            log_dir: config.log_dir.as_ref().map(|d| d.display().to_string()),
        },
        paramfiles: plan.paramfiles().iter().map(|p| p.to_string()).collect(),
        invocations,
        catalog,
    }
}

fn print_plan_info(
    plan: &RunPlan,
    invocations: &[StageInvocation],
    launcher: &ProcessLauncher,
    args: &InfoArgs,
) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                     Pipeline Run Plan                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📋 Plan");
    println!("   ├─ Version: {:?}", plan.version);
    println!("   ├─ Failure policy: {}", plan.failure_policy);
    match plan.stage_timeout() {
        Some(timeout) => println!("   └─ Stage timeout: {}s", timeout.as_secs()),
        None => println!("   └─ Stage timeout: none"),
    }

    let config = &plan.launcher;
    println!("\n🚀 Launcher");
    println!("   ├─ Command: {}", config.command.join(" "));
    println!("   ├─ Stage dir: {}", config.stage_dir.display());
    println!("   ├─ Extension: {}", config.extension);
    println!("   └─ Config arg: {}", config.config_arg);

    let paramfiles = plan.paramfiles();
    println!("\n📄 Paramfiles ({})", paramfiles.len());
    for (i, paramfile) in paramfiles.iter().enumerate() {
        let prefix = if i == paramfiles.len() - 1 { "└─" } else { "├─" };
        println!("   {} {}", prefix, paramfile);
    }

    println!("\n🔧 Invocations ({})", invocations.len());
    for (i, inv) in invocations.iter().enumerate() {
        let prefix = if i == invocations.len() - 1 { "└─" } else { "├─" };
        println!("   {} [{:02}] {}", prefix, inv.index, launcher.command_line(inv).join(" "));
    }

    if args.catalog && !plan.stages.is_empty() {
        let mut names: Vec<_> = plan.stages.keys().collect();
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        println!("\n📚 Catalog ({})", names.len());
        for (i, name) in names.iter().enumerate() {
            let prefix = if i == names.len() - 1 { "└─" } else { "├─" };
            let accepts = plan.stages[name.as_str()]
                .accepts
                .as_ref()
                .map(|flags| {
                    flags
                        .iter()
                        .map(|f| f.to_string())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_else(|| "(unchecked)".to_string());
            println!(
                "   {} {} → {} [{}]",
                prefix,
                name,
                launcher.program_path(name).display(),
                accepts
            );
        }
    }

    println!();
}
