//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Pipeline Driver - runs analysis pipeline stages against paramfiles
#[derive(Parser, Debug)]
#[command(
    name = "pipeline-driver",
    author,
    version,
    about = "Sequential driver for external analysis pipeline stages",
    long_about = "Runs the pipeline stages (pre_processer, mocker, mcmer, filterer, pcler,\n\
                  transfer, coadder) one after another against injected paramfiles,\n\
                  applying an explicit failure policy and reporting every stage outcome."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "PIPELINE_DRIVER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose", env = "PIPELINE_DRIVER_QUIET")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "PIPELINE_DRIVER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline described by a plan file
    Run(RunArgs),

    /// Validate a plan file without running anything
    Validate(ValidateArgs),

    /// Display the resolved invocation list of a plan
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to plan file (TOML or JSON)
    #[arg(short, long, default_value = "plan.toml", env = "PIPELINE_DRIVER_PLAN")]
    pub plan: PathBuf,

    /// Keep launching stages after a failure
    #[arg(long, conflicts_with = "fail_fast")]
    pub continue_on_failure: bool,

    /// Stop at the first failed stage (the default unless the plan says otherwise)
    #[arg(long)]
    pub fail_fast: bool,

    /// Per-stage timeout in seconds (0 = no timeout), overrides the plan
    #[arg(long, env = "PIPELINE_DRIVER_STAGE_TIMEOUT")]
    pub stage_timeout: Option<u64>,

    /// Replace the plan's initial paramfile
    #[arg(long, env = "PIPELINE_DRIVER_PARAMFILE")]
    pub paramfile: Option<PathBuf>,

    /// Print the resolved invocations and exit without launching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Write the run report as JSON to this path
    #[arg(long, env = "PIPELINE_DRIVER_REPORT")]
    pub report: Option<PathBuf>,

    /// Directory for per-stage stdout/stderr logs
    #[arg(long, env = "PIPELINE_DRIVER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "PIPELINE_DRIVER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to plan file to validate
    #[arg(short, long, default_value = "plan.toml")]
    pub plan: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to plan file
    #[arg(short, long, default_value = "plan.toml")]
    pub plan: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the stage catalog
    #[arg(long)]
    pub catalog: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
