//! Layered error definitions
//!
//! Categorized by source: config / plan resolution / io

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Plan file parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Plan validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Plan Resolution Errors =====
    /// A stage step appeared before any paramfile was selected
    #[error("step {step} runs stage '{stage}' but no paramfile is active yet")]
    NoActiveParamFile { step: usize, stage: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create missing paramfile error
    pub fn no_active_paramfile(step: usize, stage: impl Into<String>) -> Self {
        Self::NoActiveParamFile {
            step,
            stage: stage.into(),
        }
    }
}
