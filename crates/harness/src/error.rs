//! Error types for the harness itself
//!
//! These cover the harness infrastructure (configuration, scripts, sessions,
//! report files). Failures raised by test steps are [`crate::StepFailure`]
//! values and never become a `HarnessError`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Script parse error: {0}")]
    ScriptParse(String),

    #[error("Scripts directory not found: {0}")]
    ScriptsNotFound(PathBuf),

    #[error("Test not found: {0}")]
    TestNotFound(String),

    #[error("Session failed to open for {test}: {reason}")]
    SessionOpen { test: String, reason: String },

    #[error("Session failed to close: {0}")]
    SessionClose(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
