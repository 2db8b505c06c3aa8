//! Result models aggregated from a run

use crate::core::{ExecutionStatus, StageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a command ended
///
/// Non-zero exits and timeouts are data, never errors. A timeout is kept
/// distinct from a non-zero exit so callers can tell a killed process from a
/// failing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// Process exited on its own; -1 when killed by a signal
    Exited { code: i32 },

    /// Process exceeded its wall-clock limit and was killed
    TimedOut { after_secs: u64 },
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        matches!(self, CommandOutcome::Exited { code: 0 })
    }
}

/// Result of executing one command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// One-line rendering of the command
    pub command: String,

    /// How the process ended
    pub outcome: CommandOutcome,

    /// Captured stdout (empty on timeout)
    pub stdout: String,

    /// Captured stderr (empty on timeout)
    pub stderr: String,

    /// When the command started
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.outcome.success()
    }

    /// Short human-readable reason, for failed commands
    pub fn failure_detail(&self) -> String {
        match &self.outcome {
            CommandOutcome::Exited { code } => {
                let stderr = self.stderr.trim();
                if stderr.is_empty() {
                    format!("exit code {}", code)
                } else {
                    // First stderr line is usually the useful one
                    let first = stderr.lines().next().unwrap_or("");
                    format!("exit code {}: {}", code, first)
                }
            }
            CommandOutcome::TimedOut { after_secs } => {
                format!("timed out after {}s", after_secs)
            }
        }
    }
}

/// Result of executing one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage name
    pub name: String,

    /// Final stage status
    pub status: StageStatus,

    /// Results for the commands that ran, in order
    pub commands: Vec<CommandResult>,
}

impl StageResult {
    /// The command that failed the stage, if any
    pub fn failed_command(&self) -> Option<&CommandResult> {
        self.commands.iter().find(|c| !c.success())
    }

    pub fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: StageStatus::Skipped,
            commands: Vec::new(),
        }
    }
}

/// Final report for a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Unique run ID
    pub run_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// Host/label the configuration asked for, if any
    pub agent: Option<String>,

    /// Stage-sequence verdict; post-action failures never change it
    pub status: ExecutionStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished, post-actions included
    pub finished_at: DateTime<Utc>,

    /// Per-stage outcomes, in declared order
    pub stages: Vec<StageResult>,

    /// Results of the `always` post-action list
    pub always: Vec<CommandResult>,

    /// Results of the `on_failure` post-action list (empty unless a stage failed)
    pub on_failure: Vec<CommandResult>,
}

impl PipelineResult {
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }

    /// The stage that failed the run, if any
    pub fn failed_stage(&self) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.status == StageStatus::Failed)
    }

    pub fn stages_succeeded(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Succeeded)
            .count()
    }

    /// Number of post-action commands that did not succeed
    pub fn post_action_errors(&self) -> usize {
        self.always
            .iter()
            .chain(self.on_failure.iter())
            .filter(|c| !c.success())
            .count()
    }
}
