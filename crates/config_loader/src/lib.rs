//! # Config Loader
//!
//! Run plan loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON plan files
//! - Validate plan legality (ordering, flags, declared artifacts)
//! - Generate `RunPlan`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::PlanLoader;
//! use std::path::Path;
//!
//! let plan = PlanLoader::load_from_path(Path::new("plans/test_pipeline.toml")).unwrap();
//! println!("Stages: {}", plan.stage_steps().count());
//! ```

mod parser;
mod validator;

pub use contracts::RunPlan;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Plan loader
///
/// Provides static methods to load plans from files or strings.
pub struct PlanLoader;

impl PlanLoader {
    /// Load a plan from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<RunPlan, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load a plan from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<RunPlan, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate a plan built in code
    pub fn validate(plan: &RunPlan) -> Result<(), ContractError> {
        validator::validate(plan)
    }

    /// Serialize RunPlan to TOML string
    pub fn to_toml(plan: &RunPlan) -> Result<String, ContractError> {
        toml::to_string_pretty(plan)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize RunPlan to JSON string
    pub fn to_json(plan: &RunPlan) -> Result<String, ContractError> {
        serde_json::to_string_pretty(plan)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl PlanLoader {
    /// Infer plan format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read plan file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate plan content
    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<RunPlan, ContractError> {
        let plan = parser::parse(content, format)?;
        validator::validate(&plan)?;
        Ok(plan)
    }
}
