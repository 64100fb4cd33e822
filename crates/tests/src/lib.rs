//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试（示例计划文件可加载）
//! - 真实子进程 e2e 测试（`sh` 脚本充当 stage，仅 Unix）
//! - 真实报告上的运行指标聚合

#[cfg(test)]
mod contract_tests {
    use std::path::PathBuf;

    use config_loader::PlanLoader;
    use contracts::{FailurePolicy, PlanVersion};

    fn sample_plan_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../plans/test_pipeline.toml")
    }

    #[test]
    fn test_sample_plan_loads() {
        let plan = PlanLoader::load_from_path(&sample_plan_path()).unwrap();
        assert_eq!(plan.version, PlanVersion::V1);
        assert_eq!(plan.failure_policy, FailurePolicy::FailFast);

        let invocations = plan.resolve().unwrap();
        let stages: Vec<&str> = invocations.iter().map(|i| i.stage.as_str()).collect();
        assert_eq!(stages.first(), Some(&"pre_processer"));
        assert_eq!(stages.last(), Some(&"coadder"));
        assert!(invocations.iter().all(|i| i.stage.is_known()));
        assert_eq!(plan.paramfiles().len(), 2);
    }

    #[test]
    fn test_sample_plan_switches_paramfile_once() {
        let plan = PlanLoader::load_from_path(&sample_plan_path()).unwrap();
        let invocations = plan.resolve().unwrap();

        // Once switched, the second paramfile stays active to the end
        let first = invocations[0].paramfile.clone();
        let switch = invocations
            .iter()
            .position(|i| i.paramfile != first)
            .expect("sample plan switches paramfile");
        assert!(invocations[switch..]
            .iter()
            .all(|i| i.paramfile == invocations[switch].paramfile));
    }
}

#[cfg(all(test, unix))]
mod e2e_tests {
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use config_loader::{ConfigFormat, PlanLoader};
    use contracts::{RunPlan, RunReport, RunState, StageStatus};
    use driver::{DriverOptions, PipelineDriver, ProcessLauncher};
    use observability::RunMetricsAggregator;
    use tempfile::TempDir;

    /// Scratch area with one `sh` script per stage
    ///
    /// Every script appends `<stage> <args...>` to the trace file before
    /// running its own body.
    struct Workspace {
        dir: TempDir,
        trace: PathBuf,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let trace = dir.path().join("trace.log");
            Self { dir, trace }
        }

        fn stage(self, name: &str, body: &str) -> Self {
            let script = format!("echo \"{name} $*\" >> \"$TRACE_FILE\"\n{body}\n");
            std::fs::write(self.dir.path().join(format!("{name}.sh")), script).unwrap();
            self
        }

        fn paramfile(&self, name: &str) -> String {
            let path = self.dir.path().join(name);
            std::fs::write(&path, "# paramfile\n").unwrap();
            path.display().to_string()
        }

        fn path(&self) -> &Path {
            self.dir.path()
        }

        fn launcher_toml(&self) -> String {
            format!(
                r#"
[launcher]
command = ["sh"]
stage_dir = {stage_dir:?}
extension = ".sh"

[launcher.env]
TRACE_FILE = {trace:?}
"#,
                stage_dir = self.path().display().to_string(),
                trace = self.trace.display().to_string(),
            )
        }

        fn load_plan(&self, header: &str, steps: &str) -> RunPlan {
            let content = format!("{header}\n{}\n{steps}", self.launcher_toml());
            PlanLoader::load_from_str(&content, ConfigFormat::Toml).unwrap()
        }

        fn trace_lines(&self) -> Vec<String> {
            std::fs::read_to_string(&self.trace)
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    /// `stages` pairs a stage name with its space-separated flags
    fn steps(paramfile: &str, stages: &[(&str, &str)]) -> String {
        let mut out = format!("[[steps]]\nparamfile = {paramfile:?}\n\n");
        for (stage, flags) in stages {
            let flags: Vec<&str> = flags.split_whitespace().collect();
            out.push_str(&format!(
                "[[steps]]\nstage = {stage:?}\nflags = {flags:?}\n\n"
            ));
        }
        out
    }

    async fn run(plan: &RunPlan) -> RunReport {
        let driver = PipelineDriver::new(
            ProcessLauncher::from_plan(plan),
            DriverOptions::from_plan(plan),
        );
        driver.run_plan(plan).await.unwrap()
    }

    fn five_stage_workspace(failing_body: &str) -> Workspace {
        Workspace::new()
            .stage("pre_processer", "exit 0")
            .stage("mocker", "exit 0")
            .stage("mcmer", failing_body)
            .stage("filterer", "exit 0")
            .stage("pcler", "exit 0")
    }

    const FIVE_STAGES: &[(&str, &str)] = &[
        ("pre_processer", "sims"),
        ("mocker", ""),
        ("mcmer", ""),
        ("filterer", "data"),
        ("pcler", "data"),
    ];

    #[tokio::test]
    async fn test_stages_run_in_order_with_literal_flags() {
        let ws = Workspace::new()
            .stage("pre_processer", "exit 0")
            .stage("mocker", "exit 0")
            .stage("mcmer", "exit 0");
        let a = ws.paramfile("A.yaml");
        let plan = ws.load_plan(
            "",
            &steps(
                &a,
                &[("pre_processer", "sims"), ("mocker", ""), ("mcmer", "")],
            ),
        );

        let report = run(&plan).await;
        assert_eq!(report.state, RunState::Succeeded);
        assert_eq!(
            ws.trace_lines(),
            vec![
                format!("pre_processer --globals {a} --sims"),
                format!("mocker --globals {a}"),
                format!("mcmer --globals {a}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_paramfile_switch_mid_run() {
        let ws = Workspace::new()
            .stage("filterer", "exit 0")
            .stage("pre_processer", "exit 0");
        let a = ws.paramfile("A.yaml");
        let b = ws.paramfile("B.yaml");
        let content = format!(
            "{}{}",
            steps(&a, &[("filterer", "transfer"), ("filterer", "data")]),
            steps(&b, &[("pre_processer", "")]),
        );
        let plan = ws.load_plan("", &content);

        let report = run(&plan).await;
        assert!(report.is_success());
        assert_eq!(
            ws.trace_lines(),
            vec![
                format!("filterer --globals {a} --transfer"),
                format!("filterer --globals {a} --data"),
                format!("pre_processer --globals {b}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_fail_fast_real_exit_code() {
        let ws = five_stage_workspace("exit 3");
        let a = ws.paramfile("A.yaml");
        let plan = ws.load_plan("", &steps(&a, FIVE_STAGES));

        let report = run(&plan).await;
        assert_eq!(report.state, RunState::Failed);
        assert_eq!(ws.trace_lines().len(), 3);
        assert_eq!(
            report.outcomes[2].status,
            StageStatus::Failed {
                exit_code: Some(3),
                signal: None
            }
        );
        assert_eq!(report.outcomes[3].status, StageStatus::Skipped);
        assert_eq!(report.outcomes[4].status, StageStatus::Skipped);
    }

    #[tokio::test]
    async fn test_continue_on_failure_runs_all() {
        let ws = five_stage_workspace("exit 3");
        let a = ws.paramfile("A.yaml");
        let plan = ws.load_plan(
            "failure_policy = \"continue_on_failure\"",
            &steps(&a, FIVE_STAGES),
        );

        let report = run(&plan).await;
        assert_eq!(ws.trace_lines().len(), 5);
        assert_eq!(report.invoked_count(), 5);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.first_failure().unwrap().stage.as_str(), "mcmer");
    }

    #[tokio::test]
    async fn test_run_metrics_from_real_report() {
        let ws = five_stage_workspace("exit 3");
        let a = ws.paramfile("A.yaml");
        let plan = ws.load_plan("", &steps(&a, FIVE_STAGES));

        let report = run(&plan).await;
        let summary = RunMetricsAggregator::from_report(&report).summary();
        assert_eq!(summary.invoked, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.cancelled, 0);

        // Skipped stages have no timings
        let timed: Vec<&str> = summary.stage_durations.keys().map(String::as_str).collect();
        assert_eq!(timed, vec!["mcmer", "mocker", "pre_processer"]);
        assert!(summary.stage_durations.values().all(|s| s.count == 1));
    }

    #[tokio::test]
    async fn test_stage_timeout_kills_child() {
        let ws = five_stage_workspace("exec sleep 30");
        let a = ws.paramfile("A.yaml");
        let plan = ws.load_plan("stage_timeout_secs = 1", &steps(&a, FIVE_STAGES));

        let report = tokio::time::timeout(Duration::from_secs(20), run(&plan))
            .await
            .expect("timeout did not stop the stage");
        assert_eq!(
            report.outcomes[2].status,
            StageStatus::TimedOut { after_secs: 1 }
        );
        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.skipped_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_failure() {
        // no script for mcmer
        let ws = Workspace::new()
            .stage("pre_processer", "exit 0")
            .stage("mocker", "exit 0");
        let a = ws.paramfile("A.yaml");
        let mut plan = ws.load_plan(
            "failure_policy = \"continue_on_failure\"",
            &steps(&a, &[("pre_processer", ""), ("mcmer", ""), ("mocker", "")]),
        );
        // Run the program directly so the spawn itself fails
        plan.launcher.command.clear();

        let report = run(&plan).await;
        assert!(report
            .outcomes
            .iter()
            .all(|o| matches!(o.status, StageStatus::LaunchFailed { .. })));
        assert_eq!(report.failure_count(), 3);
        assert!(ws.trace_lines().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_kills_running_stage() {
        let ws = five_stage_workspace("exec sleep 30");
        let a = ws.paramfile("A.yaml");
        let plan = ws.load_plan("", &steps(&a, FIVE_STAGES));

        let driver = PipelineDriver::new(
            ProcessLauncher::from_plan(&plan),
            DriverOptions::from_plan(&plan),
        );
        let handle = driver.cancel_handle();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            handle.cancel();
        });

        let report = tokio::time::timeout(Duration::from_secs(20), driver.run_plan(&plan))
            .await
            .expect("cancel did not stop the run")
            .unwrap();
        canceller.await.unwrap();

        assert_eq!(report.state, RunState::Cancelled);
        assert_eq!(report.outcomes[2].status, StageStatus::Cancelled);
        assert_eq!(report.skipped_count(), 2);
        assert_eq!(ws.trace_lines().len(), 3);
    }

    #[tokio::test]
    async fn test_stage_logs_and_report_json() {
        let ws = Workspace::new().stage("coadder", "echo coadding; echo oops >&2");
        let a = ws.paramfile("A.yaml");
        let mut plan = ws.load_plan("", &steps(&a, &[("coadder", "data sims")]));
        let log_dir = ws.path().join("logs");
        plan.launcher.log_dir = Some(log_dir.clone());

        let report = run(&plan).await;
        assert!(report.is_success());

        let log = std::fs::read_to_string(log_dir.join("00_coadder.log")).unwrap();
        assert!(log.contains("coadding"));
        assert!(log.contains("oops"));

        // Flags render in canonical order regardless of plan order
        assert_eq!(
            ws.trace_lines(),
            vec![format!("coadder --globals {a} --sims --data")]
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "succeeded");
        assert_eq!(json["outcomes"][0]["status"]["kind"], "succeeded");
        assert_eq!(json["outcomes"][0]["stage"], "coadder");
    }

    #[test]
    fn test_unsatisfied_input_rejected() {
        let ws = Workspace::new();
        let a = ws.paramfile("A.yaml");
        let content = format!(
            "{}\n[[steps]]\nparamfile = {a:?}\n\n[[steps]]\nstage = \"pcler\"\ninputs = [\"filtered_maps\"]\n",
            ws.launcher_toml()
        );
        let err = PlanLoader::load_from_str(&content, ConfigFormat::Toml)
            .unwrap_err()
            .to_string();
        assert!(err.contains("filtered_maps"), "got: {err}");
    }
}
