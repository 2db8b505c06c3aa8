//! Command executor - the sole external-process boundary

use crate::core::Command;
use crate::execution::result::{CommandOutcome, CommandResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Unrecoverable host errors
///
/// Everything a spawned process does on its own - non-zero exits, timeouts -
/// is captured in the [`CommandResult`]. These errors mean the process
/// boundary itself is unusable, and they abort the run without post-actions.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("executable not found: {program}")]
    NotFound { program: String },

    #[error("permission denied running {program}")]
    PermissionDenied { program: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Trait for running commands - allows a scripted runner in tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command under the given shared environment and wait for it
    async fn run(
        &self,
        command: &Command,
        shared_env: &HashMap<String, String>,
    ) -> Result<CommandResult, ExecError>;
}

/// Runner that spawns real child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn map_spawn_error(program: &str, error: std::io::Error) -> ExecError {
        match error.kind() {
            std::io::ErrorKind::NotFound => ExecError::NotFound {
                program: program.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => ExecError::PermissionDenied {
                program: program.to_string(),
            },
            _ => ExecError::Spawn {
                program: program.to_string(),
                source: error,
            },
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        command: &Command,
        shared_env: &HashMap<String, String>,
    ) -> Result<CommandResult, ExecError> {
        let display_str = command.display();
        debug!("Spawning: {}", display_str);

        let merged_env = command.merged_env(shared_env);

        let mut process = tokio::process::Command::new(&command.program);
        process
            .args(&command.args)
            .envs(&merged_env)
            .kill_on_drop(true);

        if let Some(cwd) = &command.cwd {
            process.current_dir(cwd);
        }

        let started_at = Utc::now();
        let start = Instant::now();

        let output = match command.timeout {
            Some(limit) => match timeout(limit, process.output()).await {
                Ok(result) => result,
                Err(_) => {
                    // Dropping the output future kills the child (kill_on_drop)
                    warn!("Command timed out after {:?}: {}", limit, display_str);
                    return Ok(CommandResult {
                        command: display_str,
                        outcome: CommandOutcome::TimedOut {
                            after_secs: limit.as_secs(),
                        },
                        stdout: String::new(),
                        stderr: String::new(),
                        started_at,
                        duration_ms: start.elapsed().as_millis() as u64,
                    });
                }
            },
            None => process.output().await,
        };

        let output = output.map_err(|e| Self::map_spawn_error(&command.program, e))?;

        let code = output.status.code().unwrap_or(-1);
        if code != 0 {
            warn!("Command exited with code {}: {}", code, display_str);
        }

        Ok(CommandResult {
            command: display_str,
            outcome: CommandOutcome::Exited { code },
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let runner = ProcessRunner::new();
        let command = Command::shell("echo hello");

        let result = runner.run(&command, &HashMap::new()).await.unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_data_not_error() {
        let runner = ProcessRunner::new();
        let command = Command::shell("exit 3");

        let result = runner.run(&command, &HashMap::new()).await.unwrap();
        assert!(!result.success());
        assert_eq!(result.outcome, CommandOutcome::Exited { code: 3 });
    }

    #[tokio::test]
    async fn test_env_override_reaches_child() {
        let runner = ProcessRunner::new();
        let mut shared = HashMap::new();
        shared.insert("GREETING".to_string(), "shared".to_string());

        let command = Command::shell("printf %s \"$GREETING\"").with_env("GREETING", "override");
        let result = runner.run(&command, &shared).await.unwrap();
        assert_eq!(result.stdout, "override");
    }

    #[tokio::test]
    async fn test_timeout_yields_timed_out_not_exit() {
        let runner = ProcessRunner::new();
        let command = Command::shell("sleep 5").with_timeout(Duration::from_millis(100));

        let result = runner.run(&command, &HashMap::new()).await.unwrap();
        assert!(matches!(result.outcome, CommandOutcome::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_missing_executable_is_host_error() {
        let runner = ProcessRunner::new();
        let command = Command::exec("stagerun-no-such-binary", vec![]);

        let result = runner.run(&command, &HashMap::new()).await;
        assert!(matches!(result, Err(ExecError::NotFound { .. })));
    }
}
