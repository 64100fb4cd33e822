//! 计划校验模块
//!
//! 校验规则：
//! - 至少一个 stage 步骤
//! - 第一个 stage 之前必须选定 paramfile
//! - 字段级校验 (stage 名称、paramfile 路径、launcher 参数)
//! - 同一步骤内 flag 不重复
//! - flag 属于 catalog 声明的 accepts 集合
//! - 声明的 inputs 在同一 paramfile 下已由前序步骤产出

use std::collections::HashSet;

use contracts::{ContractError, ParamFile, PipelineStep, RunPlan, StageStep};
use validator::Validate;

/// 校验 RunPlan
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(plan: &RunPlan) -> Result<(), ContractError> {
    validate_launcher(plan)?;
    validate_has_stages(plan)?;
    validate_step_fields(plan)?;
    validate_paramfile_first(plan)?;
    validate_flags(plan)?;
    validate_artifacts(plan)?;
    Ok(())
}

/// 校验 launcher 配置
fn validate_launcher(plan: &RunPlan) -> Result<(), ContractError> {
    plan.launcher
        .validate()
        .map_err(|e| ContractError::config_validation("launcher", e.to_string()))?;

    if let Some(idx) = plan.launcher.command.iter().position(|c| c.trim().is_empty()) {
        return Err(ContractError::config_validation(
            format!("launcher.command[{idx}]"),
            "command entries cannot be empty",
        ));
    }
    Ok(())
}

/// 校验至少存在一个 stage
fn validate_has_stages(plan: &RunPlan) -> Result<(), ContractError> {
    if plan.stage_steps().next().is_none() {
        return Err(ContractError::config_validation(
            "steps",
            "plan has no stage steps",
        ));
    }
    Ok(())
}

/// 字段级校验 (validator derive)
fn validate_step_fields(plan: &RunPlan) -> Result<(), ContractError> {
    for (idx, step) in plan.steps.iter().enumerate() {
        let result = match step {
            PipelineStep::UseParamFile(s) => s.validate(),
            PipelineStep::Invoke(s) => s.validate(),
        };
        result.map_err(|e| {
            ContractError::config_validation(format!("steps[{idx}]"), e.to_string())
        })?;
    }

    for name in plan.stages.keys() {
        if name.trim().is_empty() {
            return Err(ContractError::config_validation(
                "stages",
                "catalog stage name cannot be empty",
            ));
        }
    }
    Ok(())
}

/// 校验第一个 stage 之前已选定 paramfile
fn validate_paramfile_first(plan: &RunPlan) -> Result<(), ContractError> {
    for (idx, step) in plan.steps.iter().enumerate() {
        match step {
            PipelineStep::UseParamFile(_) => return Ok(()),
            PipelineStep::Invoke(s) => {
                return Err(ContractError::config_validation(
                    format!("steps[{idx}]"),
                    format!("stage '{}' runs before any paramfile is selected", s.stage),
                ));
            }
        }
    }
    Ok(())
}

/// 校验 flag：不重复，且属于 catalog 的 accepts
fn validate_flags(plan: &RunPlan) -> Result<(), ContractError> {
    for (idx, step) in plan.steps.iter().enumerate() {
        let PipelineStep::Invoke(s) = step else {
            continue;
        };

        let mut seen = HashSet::new();
        for flag in &s.flags {
            if !seen.insert(flag) {
                return Err(ContractError::config_validation(
                    format!("steps[{idx}].flags"),
                    format!("duplicate flag {flag}"),
                ));
            }
        }

        let accepts = plan
            .stages
            .get(s.stage.as_str())
            .and_then(|entry| entry.accepts.as_ref());
        if let Some(accepts) = accepts {
            if let Some(flag) = s.flags.iter().find(|f| !accepts.contains(f)) {
                return Err(ContractError::config_validation(
                    format!("steps[{idx}].flags"),
                    format!("stage '{}' does not accept {flag}", s.stage),
                ));
            }
        }
    }
    Ok(())
}

/// 校验 artifact 顺序
///
/// 工作区按 paramfile 划分：切换 paramfile 后，之前产出的 artifact 不可见。
fn validate_artifacts(plan: &RunPlan) -> Result<(), ContractError> {
    let external: HashSet<&str> = plan.external_artifacts.iter().map(String::as_str).collect();
    let mut produced: HashSet<(&ParamFile, &str)> = HashSet::new();
    let mut active: Option<&ParamFile> = None;

    for (idx, step) in plan.steps.iter().enumerate() {
        match step {
            PipelineStep::UseParamFile(s) => active = Some(&s.paramfile),
            PipelineStep::Invoke(s) => {
                // validate_paramfile_first 已保证 active 存在
                let Some(paramfile) = active else {
                    continue;
                };
                check_inputs(idx, s, paramfile, &external, &produced)?;
                for output in &s.outputs {
                    produced.insert((paramfile, output.as_str()));
                }
            }
        }
    }
    Ok(())
}

fn check_inputs(
    idx: usize,
    step: &StageStep,
    paramfile: &ParamFile,
    external: &HashSet<&str>,
    produced: &HashSet<(&ParamFile, &str)>,
) -> Result<(), ContractError> {
    for input in &step.inputs {
        let available =
            external.contains(input.as_str()) || produced.contains(&(paramfile, input.as_str()));
        if !available {
            return Err(ContractError::config_validation(
                format!("steps[{idx}].inputs"),
                format!(
                    "stage '{}' needs '{input}' but no earlier step produces it for {paramfile}",
                    step.stage
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{LauncherConfig, StageCatalogEntry, StageFlag};

    fn minimal_plan() -> RunPlan {
        RunPlan::builder()
            .paramfile("A.yaml")
            .step(
                StageStep::new("pre_processer")
                    .with_flags([StageFlag::Sims])
                    .with_outputs(["sims"]),
            )
            .step(
                StageStep::new("mocker")
                    .with_inputs(["sims"])
                    .with_outputs(["mocks"]),
            )
            .step(StageStep::new("mcmer").with_inputs(["mocks"]))
            .build()
    }

    #[test]
    fn test_valid_plan() {
        let plan = minimal_plan();
        assert!(validate(&plan).is_ok());
    }

    #[test]
    fn test_no_stages() {
        let plan = RunPlan::builder().paramfile("A.yaml").build();
        let err = validate(&plan).unwrap_err().to_string();
        assert!(err.contains("no stage steps"), "got: {err}");
    }

    #[test]
    fn test_stage_before_paramfile() {
        let plan = RunPlan::builder()
            .stage("mocker", [])
            .paramfile("A.yaml")
            .build();
        let err = validate(&plan).unwrap_err().to_string();
        assert!(err.contains("before any paramfile"), "got: {err}");
    }

    #[test]
    fn test_empty_stage_name() {
        let plan = RunPlan::builder()
            .paramfile("A.yaml")
            .stage("", [])
            .build();
        let err = validate(&plan).unwrap_err().to_string();
        assert!(err.contains("steps[1]"), "got: {err}");
    }

    #[test]
    fn test_empty_paramfile() {
        let plan = RunPlan::builder().paramfile("").stage("mocker", []).build();
        let err = validate(&plan).unwrap_err().to_string();
        assert!(err.contains("steps[0]"), "got: {err}");
    }

    #[test]
    fn test_duplicate_flag() {
        let plan = RunPlan::builder()
            .paramfile("A.yaml")
            .stage("pcler", [StageFlag::Data, StageFlag::Data])
            .build();
        let err = validate(&plan).unwrap_err().to_string();
        assert!(err.contains("duplicate flag --data"), "got: {err}");
    }

    #[test]
    fn test_flag_outside_catalog() {
        let plan = RunPlan::builder()
            .catalog(
                "mcmer",
                StageCatalogEntry {
                    program: None,
                    accepts: Some(vec![StageFlag::Plots]),
                },
            )
            .paramfile("A.yaml")
            .stage("mcmer", [StageFlag::Sims])
            .build();
        let err = validate(&plan).unwrap_err().to_string();
        assert!(err.contains("does not accept --sims"), "got: {err}");
    }

    #[test]
    fn test_catalog_without_accepts_is_unchecked() {
        let plan = RunPlan::builder()
            .catalog("mcmer", StageCatalogEntry::default())
            .paramfile("A.yaml")
            .stage("mcmer", [StageFlag::Sims, StageFlag::TfEst])
            .build();
        assert!(validate(&plan).is_ok());
    }

    #[test]
    fn test_missing_input() {
        let plan = RunPlan::builder()
            .paramfile("A.yaml")
            .step(StageStep::new("mcmer").with_inputs(["mocks"]))
            .build();
        let err = validate(&plan).unwrap_err().to_string();
        assert!(err.contains("needs 'mocks'"), "got: {err}");
    }

    #[test]
    fn test_external_artifact_satisfies_input() {
        let plan = RunPlan::builder()
            .external_artifact("raw_maps")
            .paramfile("A.yaml")
            .step(StageStep::new("pre_processer").with_inputs(["raw_maps"]))
            .build();
        assert!(validate(&plan).is_ok());
    }

    #[test]
    fn test_artifacts_do_not_cross_paramfiles() {
        let plan = RunPlan::builder()
            .paramfile("A.yaml")
            .step(StageStep::new("mocker").with_outputs(["mocks"]))
            .paramfile("B.yaml")
            .step(StageStep::new("mcmer").with_inputs(["mocks"]))
            .build();
        let err = validate(&plan).unwrap_err().to_string();
        assert!(err.contains("B.yaml"), "got: {err}");
    }

    #[test]
    fn test_empty_config_arg() {
        let mut plan = minimal_plan();
        plan.launcher = LauncherConfig {
            config_arg: String::new(),
            ..Default::default()
        };
        let err = validate(&plan).unwrap_err().to_string();
        assert!(err.contains("launcher"), "got: {err}");
    }

    #[test]
    fn test_empty_command_entry() {
        let mut plan = minimal_plan();
        plan.launcher.command = vec!["python".into(), " ".into()];
        let err = validate(&plan).unwrap_err().to_string();
        assert!(err.contains("launcher.command[1]"), "got: {err}");
    }
}
