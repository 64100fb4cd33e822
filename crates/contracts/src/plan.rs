//! RunPlan - Config Loader output
//!
//! Describes a complete run: launcher settings, failure policy, optional
//! stage catalog and the ordered list of steps.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::{ContractError, StageFlag, StageInvocation, StageName};

/// Plan file version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlanVersion {
    #[default]
    V1,
}

/// Configuration reference: path to a paramfile
///
/// Opaque to the driver; it is handed to every stage verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamFile(PathBuf);

impl ParamFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Whether the file exists on disk
    pub fn exists(&self) -> bool {
        self.0.is_file()
    }

    /// Whether the path is empty
    pub fn is_empty(&self) -> bool {
        self.0.as_os_str().is_empty()
    }
}

impl fmt::Display for ParamFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&str> for ParamFile {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for ParamFile {
    fn from(p: PathBuf) -> Self {
        Self(p)
    }
}

/// How the driver reacts to a failed stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop launching stages after the first failure
    #[default]
    FailFast,
    /// Launch every stage and report all failures at the end
    ContinueOnFailure,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => f.write_str("fail_fast"),
            Self::ContinueOnFailure => f.write_str("continue_on_failure"),
        }
    }
}

/// How stage programs are turned into command lines
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LauncherConfig {
    /// Interpreter prefix, e.g. `["python"]`; empty runs the program directly
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    /// Directory holding the stage programs
    #[serde(default = "default_stage_dir")]
    pub stage_dir: PathBuf,

    /// Program file extension, including the dot
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Argument that precedes the paramfile path
    #[serde(default = "default_config_arg")]
    #[validate(length(min = 1, message = "config_arg cannot be empty"))]
    pub config_arg: String,

    /// Working directory for every stage (defaults to the driver's)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Arguments appended after the flags
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Write each stage's stdout/stderr to `<log_dir>/<NN>_<stage>.log`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

fn default_command() -> Vec<String> {
    vec!["python".to_string()]
}

fn default_stage_dir() -> PathBuf {
    PathBuf::from("pipeline")
}

fn default_extension() -> String {
    ".py".to_string()
}

fn default_config_arg() -> String {
    "--globals".to_string()
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            stage_dir: default_stage_dir(),
            extension: default_extension(),
            config_arg: default_config_arg(),
            working_dir: None,
            env: HashMap::new(),
            extra_args: Vec::new(),
            log_dir: None,
        }
    }
}

/// Optional per-stage metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageCatalogEntry {
    /// Explicit program path, replacing `<stage_dir>/<stage><extension>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,

    /// Flags the program understands; `None` means unchecked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepts: Option<Vec<StageFlag>>,
}

/// Step that switches the active paramfile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ParamFileStep {
    #[validate(custom(function = "validate_paramfile"))]
    pub paramfile: ParamFile,
}

/// Step that runs one stage against the active paramfile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct StageStep {
    #[validate(custom(function = "validate_stage_name"))]
    pub stage: StageName,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<StageFlag>,

    /// Artifacts this step reads from the paramfile's work area
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,

    /// Artifacts this step writes to the paramfile's work area
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
}

impl StageStep {
    pub fn new(stage: impl Into<StageName>) -> Self {
        Self {
            stage: stage.into(),
            flags: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_flags(mut self, flags: impl IntoIterator<Item = StageFlag>) -> Self {
        self.flags = flags.into_iter().collect();
        self
    }

    pub fn with_inputs<S: Into<String>>(mut self, inputs: impl IntoIterator<Item = S>) -> Self {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<S: Into<String>>(mut self, outputs: impl IntoIterator<Item = S>) -> Self {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }
}

fn validate_stage_name(name: &StageName) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("stage name cannot be empty"));
    }
    Ok(())
}

fn validate_paramfile(paramfile: &ParamFile) -> Result<(), ValidationError> {
    if paramfile.is_empty() {
        return Err(ValidationError::new("paramfile path cannot be empty"));
    }
    Ok(())
}

/// One entry of `steps`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineStep {
    UseParamFile(ParamFileStep),
    Invoke(StageStep),
}

/// Complete run description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPlan {
    #[serde(default)]
    pub version: PlanVersion,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Per-stage timeout in seconds (0 = none)
    #[serde(default)]
    pub stage_timeout_secs: u64,

    /// Artifacts present before the run starts, in every work area
    #[serde(default)]
    pub external_artifacts: Vec<String>,

    #[serde(default)]
    pub launcher: LauncherConfig,

    #[serde(default)]
    pub stages: HashMap<StageName, StageCatalogEntry>,

    pub steps: Vec<PipelineStep>,
}

impl RunPlan {
    pub fn builder() -> RunPlanBuilder {
        RunPlanBuilder::default()
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        (self.stage_timeout_secs > 0).then(|| Duration::from_secs(self.stage_timeout_secs))
    }

    /// Stage steps only, in order
    pub fn stage_steps(&self) -> impl Iterator<Item = &StageStep> {
        self.steps.iter().filter_map(|step| match step {
            PipelineStep::Invoke(s) => Some(s),
            PipelineStep::UseParamFile(_) => None,
        })
    }

    /// Every paramfile the plan switches to, in order of first use
    pub fn paramfiles(&self) -> Vec<&ParamFile> {
        let mut seen: Vec<&ParamFile> = Vec::new();
        for step in &self.steps {
            if let PipelineStep::UseParamFile(s) = step {
                if !seen.contains(&&s.paramfile) {
                    seen.push(&s.paramfile);
                }
            }
        }
        seen
    }

    /// Replace the first paramfile selection, or prepend one if the plan
    /// has none
    pub fn override_initial_paramfile(&mut self, paramfile: ParamFile) {
        let first = self
            .steps
            .iter_mut()
            .find_map(|step| match step {
                PipelineStep::UseParamFile(s) => Some(s),
                PipelineStep::Invoke(_) => None,
            });

        match first {
            Some(step) => step.paramfile = paramfile,
            None => self
                .steps
                .insert(0, PipelineStep::UseParamFile(ParamFileStep { paramfile })),
        }
    }

    /// Flatten the plan into the ordered invocation list
    ///
    /// Each invocation receives the paramfile active at its position; a
    /// switch only affects the stages after it.
    pub fn resolve(&self) -> Result<Vec<StageInvocation>, ContractError> {
        let mut active: Option<&ParamFile> = None;
        let mut invocations = Vec::new();

        for (step_idx, step) in self.steps.iter().enumerate() {
            match step {
                PipelineStep::UseParamFile(s) => active = Some(&s.paramfile),
                PipelineStep::Invoke(s) => {
                    let paramfile = active.ok_or_else(|| {
                        ContractError::no_active_paramfile(step_idx, s.stage.as_str())
                    })?;
                    invocations.push(StageInvocation::new(
                        invocations.len(),
                        s.stage.clone(),
                        paramfile.clone(),
                        s.flags.iter().copied().collect(),
                    ));
                }
            }
        }

        Ok(invocations)
    }
}

/// Builds a [`RunPlan`] in code
#[derive(Debug, Default)]
pub struct RunPlanBuilder {
    failure_policy: FailurePolicy,
    stage_timeout_secs: u64,
    external_artifacts: Vec<String>,
    launcher: Option<LauncherConfig>,
    stages: HashMap<StageName, StageCatalogEntry>,
    steps: Vec<PipelineStep>,
}

impl RunPlanBuilder {
    /// Switch the active paramfile for the steps that follow
    pub fn paramfile(mut self, paramfile: impl Into<ParamFile>) -> Self {
        self.steps.push(PipelineStep::UseParamFile(ParamFileStep {
            paramfile: paramfile.into(),
        }));
        self
    }

    pub fn stage(
        self,
        stage: impl Into<StageName>,
        flags: impl IntoIterator<Item = StageFlag>,
    ) -> Self {
        self.step(StageStep::new(stage).with_flags(flags))
    }

    pub fn step(mut self, step: StageStep) -> Self {
        self.steps.push(PipelineStep::Invoke(step));
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn stage_timeout_secs(mut self, secs: u64) -> Self {
        self.stage_timeout_secs = secs;
        self
    }

    pub fn external_artifact(mut self, name: impl Into<String>) -> Self {
        self.external_artifacts.push(name.into());
        self
    }

    pub fn launcher(mut self, launcher: LauncherConfig) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn catalog(mut self, stage: impl Into<StageName>, entry: StageCatalogEntry) -> Self {
        self.stages.insert(stage.into(), entry);
        self
    }

    pub fn build(self) -> RunPlan {
        RunPlan {
            version: PlanVersion::V1,
            failure_policy: self.failure_policy,
            stage_timeout_secs: self.stage_timeout_secs,
            external_artifacts: self.external_artifacts,
            launcher: self.launcher.unwrap_or_default(),
            stages: self.stages,
            steps: self.steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_uses_active_paramfile() {
        let plan = RunPlan::builder()
            .paramfile("A")
            .stage("pre_processer", [StageFlag::Sims])
            .stage("mocker", [])
            .stage("mcmer", [])
            .build();

        let invocations = plan.resolve().unwrap();
        assert_eq!(invocations.len(), 3);
        let names: Vec<_> = invocations.iter().map(|i| i.stage.as_str()).collect();
        assert_eq!(names, vec!["pre_processer", "mocker", "mcmer"]);
        assert!(invocations.iter().all(|i| i.paramfile == ParamFile::from("A")));
        assert_eq!(invocations[0].flag_args(), vec!["--sims"]);
        assert!(invocations[1].flags.is_empty());
    }

    #[test]
    fn test_switch_affects_only_later_steps() {
        let plan = RunPlan::builder()
            .paramfile("A")
            .stage("filterer", [StageFlag::Transfer])
            .stage("filterer", [StageFlag::Data])
            .paramfile("B")
            .stage("pre_processer", [])
            .build();

        let invocations = plan.resolve().unwrap();
        assert_eq!(invocations.len(), 3);
        assert_eq!(invocations[0].paramfile, ParamFile::from("A"));
        assert_eq!(invocations[1].paramfile, ParamFile::from("A"));
        assert_eq!(invocations[2].paramfile, ParamFile::from("B"));
        assert_eq!(invocations[2].index, 2);
    }

    #[test]
    fn test_resolve_without_paramfile_fails() {
        let plan = RunPlan::builder().stage("mocker", []).build();
        let err = plan.resolve().unwrap_err();
        assert!(matches!(err, ContractError::NoActiveParamFile { step: 0, .. }));
    }

    #[test]
    fn test_override_initial_paramfile() {
        let mut plan = RunPlan::builder()
            .paramfile("A")
            .stage("mocker", [])
            .paramfile("B")
            .stage("mcmer", [])
            .build();
        plan.override_initial_paramfile("C".into());

        let invocations = plan.resolve().unwrap();
        assert_eq!(invocations[0].paramfile, ParamFile::from("C"));
        assert_eq!(invocations[1].paramfile, ParamFile::from("B"));
    }

    #[test]
    fn test_override_prepends_when_missing() {
        let mut plan = RunPlan::builder().stage("mocker", []).build();
        plan.override_initial_paramfile("C".into());
        assert_eq!(plan.resolve().unwrap()[0].paramfile, ParamFile::from("C"));
    }

    #[test]
    fn test_paramfiles_dedup_in_order() {
        let plan = RunPlan::builder()
            .paramfile("A")
            .paramfile("B")
            .paramfile("A")
            .build();
        let files: Vec<String> = plan.paramfiles().iter().map(|p| p.to_string()).collect();
        assert_eq!(files, vec!["A", "B"]);
    }

    #[test]
    fn test_step_shapes_deserialize() {
        let json = r#"[
            { "paramfile": "A.yaml" },
            { "stage": "pcler", "flags": ["data", "plots"] }
        ]"#;
        let steps: Vec<PipelineStep> = serde_json::from_str(json).unwrap();
        assert!(matches!(steps[0], PipelineStep::UseParamFile(_)));
        match &steps[1] {
            PipelineStep::Invoke(s) => {
                assert_eq!(s.stage, "pcler");
                assert_eq!(s.flags, vec![StageFlag::Data, StageFlag::Plots]);
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_stage_timeout() {
        let plan = RunPlan::builder().stage_timeout_secs(0).build();
        assert_eq!(plan.stage_timeout(), None);
        let plan = RunPlan::builder().stage_timeout_secs(30).build();
        assert_eq!(plan.stage_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_field_validation() {
        let step = StageStep::new("");
        assert!(step.validate().is_err());
        let step = StageStep::new("mcmer");
        assert!(step.validate().is_ok());

        let launcher = LauncherConfig {
            config_arg: String::new(),
            ..Default::default()
        };
        assert!(launcher.validate().is_err());
    }
}
