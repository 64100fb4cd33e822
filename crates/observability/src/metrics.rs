//! 运行指标收集模块
//!
//! 基于 StageOutcome / RunReport 收集和统计驱动器的运行指标。

use std::collections::BTreeMap;

use contracts::{RunReport, StageOutcome, StageStatus};
use metrics::{counter, gauge, histogram};

/// 记录 stage 启动
pub fn record_stage_started(stage: &str) {
    counter!(
        "pipeline_driver_stages_started_total",
        "stage" => stage.to_string()
    )
    .increment(1);
}

/// 记录 stage 结束
///
/// 每个 invocation 结束时调用一次（包括 skipped）。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_stage_outcome;
///
/// let outcome = launcher_result_to_outcome(...);
/// record_stage_outcome(&outcome);
/// ```
pub fn record_stage_outcome(outcome: &StageOutcome) {
    let stage = outcome.stage.to_string();

    counter!(
        "pipeline_driver_stages_finished_total",
        "stage" => stage.clone(),
        "status" => outcome.status.label()
    )
    .increment(1);

    if !outcome.status.was_invoked() {
        return;
    }

    histogram!(
        "pipeline_driver_stage_duration_seconds",
        "stage" => stage.clone()
    )
    .record(outcome.duration().as_secs_f64());

    if let StageStatus::Failed {
        exit_code: Some(code),
        ..
    } = outcome.status
    {
        gauge!("pipeline_driver_last_exit_code", "stage" => stage).set(code as f64);
    }
}

/// 记录整个 run 的结果
pub fn record_run_report(report: &RunReport) {
    let state = format!("{:?}", report.state).to_lowercase();
    counter!("pipeline_driver_runs_total", "state" => state).increment(1);
    histogram!("pipeline_driver_run_duration_seconds").record(report.duration().as_secs_f64());
    gauge!("pipeline_driver_run_failures").set(report.failure_count() as f64);
}

/// 运行指标聚合器
///
/// 在内存中聚合 stage 结果，便于输出摘要。
#[derive(Debug, Clone, Default)]
pub struct RunMetricsAggregator {
    /// 已启动的 stage 数
    pub invoked: u64,

    /// 成功数
    pub succeeded: u64,

    /// 失败数 (非零退出、启动失败、超时)
    pub failed: u64,

    /// 未启动数
    pub skipped: u64,

    /// 被取消数
    pub cancelled: u64,

    /// 各 stage 耗时统计 (秒)
    pub duration_stats: BTreeMap<String, RunningStats>,
}

impl RunMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 从完整报告构建
    pub fn from_report(report: &RunReport) -> Self {
        let mut aggregator = Self::new();
        for outcome in &report.outcomes {
            aggregator.update(outcome);
        }
        aggregator
    }

    /// 更新聚合统计
    pub fn update(&mut self, outcome: &StageOutcome) {
        match &outcome.status {
            StageStatus::Skipped => {
                self.skipped += 1;
                return;
            }
            StageStatus::Succeeded => self.succeeded += 1,
            StageStatus::Cancelled => self.cancelled += 1,
            status if status.is_failure() => self.failed += 1,
            _ => {}
        }

        self.invoked += 1;
        self.duration_stats
            .entry(outcome.stage.to_string())
            .or_default()
            .push(outcome.duration().as_secs_f64());
    }

    /// 生成摘要报告
    pub fn summary(&self) -> RunMetricsSummary {
        RunMetricsSummary {
            invoked: self.invoked,
            succeeded: self.succeeded,
            failed: self.failed,
            skipped: self.skipped,
            cancelled: self.cancelled,
            success_rate: if self.invoked > 0 {
                self.succeeded as f64 / self.invoked as f64 * 100.0
            } else {
                0.0
            },
            stage_durations: self
                .duration_stats
                .iter()
                .map(|(stage, stats)| (stage.clone(), StatsSummary::from(stats)))
                .collect(),
        }
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct RunMetricsSummary {
    pub invoked: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub cancelled: u64,
    pub success_rate: f64,
    pub stage_durations: BTreeMap<String, StatsSummary>,
}

impl std::fmt::Display for RunMetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Run Metrics Summary ===")?;
        writeln!(
            f,
            "Invoked: {} (succeeded {}, {:.2}%)",
            self.invoked, self.succeeded, self.success_rate
        )?;
        writeln!(f, "Failed: {}", self.failed)?;
        writeln!(f, "Cancelled: {}", self.cancelled)?;
        writeln!(f, "Skipped: {}", self.skipped)?;

        if !self.stage_durations.is_empty() {
            writeln!(f, "Stage durations (s):")?;
            for (stage, stats) in &self.stage_durations {
                writeln!(f, "  {}: {}", stage, stats)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
