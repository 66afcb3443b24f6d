//! Error types for the device control plane

use thiserror::Error;

/// Main error type for mapiod
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Caller input failed a precondition; no external command was issued
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A firmware install is already in flight for this process
    #[error("A firmware update is already in progress")]
    AlreadyUpdating,

    /// An external tool could not be run, exited unsuccessfully or produced
    /// output of an unexpected shape
    #[error("Execution error: `{command}` (exit status {exit_status:?}): {stderr}")]
    ExecutionError {
        command: String,
        exit_status: Option<i32>,
        stderr: String,
    },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Build an execution error for output that could not be parsed
    pub fn malformed_output(command: &str, detail: impl Into<String>) -> Self {
        AgentError::ExecutionError {
            command: command.to_string(),
            exit_status: Some(0),
            stderr: detail.into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Internal(err.to_string())
    }
}
