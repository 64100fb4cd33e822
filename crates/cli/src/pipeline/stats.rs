//! Run statistics and summary output.

use std::time::Duration;

use contracts::{RunReport, StageStatus};
use observability::RunMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Full per-stage report
    pub report: RunReport,

    /// Wall-clock duration including setup
    pub duration: Duration,

    /// Aggregated stage metrics
    pub metrics: RunMetricsAggregator,
}

impl RunStats {
    pub fn new(report: RunReport, duration: Duration) -> Self {
        let metrics = RunMetricsAggregator::from_report(&report);
        Self {
            report,
            duration,
            metrics,
        }
    }

    /// Failure rate over launched stages, as percentage
    pub fn failure_rate(&self) -> f64 {
        let invoked = self.report.invoked_count();
        if invoked > 0 {
            (self.report.failure_count() as f64 / invoked as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Run Summary                      ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ State: {:?}", self.report.state);
        println!("   ├─ Policy: {}", self.report.policy);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Launched: {}", self.report.invoked_count());
        println!("   ├─ Succeeded: {}", self.report.succeeded_count());
        println!(
            "   ├─ Failed: {} ({:.2}%)",
            self.report.failure_count(),
            self.failure_rate()
        );
        println!("   └─ Skipped: {}", self.report.skipped_count());

        println!("\n🔧 Stages");
        let last = self.report.outcomes.len().saturating_sub(1);
        for (i, outcome) in self.report.outcomes.iter().enumerate() {
            let prefix = if i == last { "└─" } else { "├─" };
            let flags: Vec<&str> = contracts::flag_args(&outcome.flags);
            println!(
                "   {} [{:02}] {} {} {} → {}",
                prefix,
                outcome.index,
                outcome.stage,
                outcome.paramfile,
                flags.join(" "),
                describe(&outcome.status, outcome.duration()),
            );
        }

        let summary = self.metrics.summary();
        if !summary.stage_durations.is_empty() {
            println!("\n⏱  Stage Durations (s)");
            for (stage, stats) in &summary.stage_durations {
                println!("   ├─ {}: {}", stage, stats);
            }
        }

        println!();
    }
}

fn describe(status: &StageStatus, elapsed: Duration) -> String {
    match status {
        StageStatus::Succeeded => format!("ok ({:.2}s)", elapsed.as_secs_f64()),
        StageStatus::Failed {
            exit_code: Some(code),
            ..
        } => format!("FAILED exit {code}"),
        StageStatus::Failed {
            signal: Some(signal),
            ..
        } => format!("FAILED signal {signal}"),
        StageStatus::Failed { .. } => "FAILED".to_string(),
        StageStatus::LaunchFailed { message } => format!("LAUNCH FAILED: {message}"),
        StageStatus::TimedOut { after_secs } => format!("TIMED OUT after {after_secs}s"),
        StageStatus::Cancelled => "cancelled".to_string(),
        StageStatus::Skipped => "skipped".to_string(),
    }
}
