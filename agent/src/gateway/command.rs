//! Process execution for external tools

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::AgentError;
use crate::utils::snippet;

/// Maximum characters of stderr kept in an execution error
const STDERR_SNIPPET_CHARS: usize = 512;

/// Captured result of one finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_status: Option<i32>,
}

impl CommandOutput {
    /// Successful output carrying `stdout`
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_status: Some(0),
        }
    }

    /// Failed output with `exit_status` and `stderr`
    pub fn failed(exit_status: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_status: Some(exit_status),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }

    /// Stdout when the process exited successfully, an execution error
    /// naming `command` otherwise
    pub fn into_stdout(self, command: &str) -> Result<String, AgentError> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(AgentError::ExecutionError {
                command: command.to_string(),
                exit_status: self.exit_status,
                stderr: snippet(&self.stderr, STDERR_SNIPPET_CHARS),
            })
        }
    }
}

/// Render a program and its arguments the way they appear in logs and errors
pub fn display_command(program: &str, args: &[&str]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

/// Runs one external program to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`. Errors only when the process could not be
    /// started; the exit status is left to the caller.
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, AgentError>;

    /// Run and require a successful exit, returning stdout
    async fn run_checked(&self, program: &str, args: &[&str]) -> Result<String, AgentError> {
        let output = self.run(program, args).await?;
        output.into_stdout(&display_command(program, args))
    }
}

/// Runs programs as child processes of the control plane
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, AgentError> {
        let command = display_command(program, args);
        debug!("Running: {}", command);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| AgentError::ExecutionError {
                command: command.clone(),
                exit_status: None,
                stderr: e.to_string(),
            })?;

        let output = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_status: output.status.code(),
        };
        debug!("`{}` exited with {:?}", command, output.exit_status);
        Ok(output)
    }
}
