//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Pipeline is currently running
    Running,
    /// Every stage succeeded
    Succeeded,
    /// A stage failed
    Failed,
    /// A cancellation request took effect between stages
    Cancelled,
}

impl ExecutionStatus {
    /// Check if this is a terminal verdict
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Succeeded | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// Status of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    /// Stage has not run yet
    Pending,
    /// Stage is currently running
    Running,
    /// Every command in the stage exited zero
    Succeeded,
    /// A command failed or timed out
    Failed,
    /// Stage never ran because an earlier stage failed or the run was cancelled
    Skipped,
}

/// Overall pipeline state
///
/// Transitions `Pending -> Running -> {Succeeded, Failed, Cancelled}`;
/// post-actions always run after the verdict is recorded, and
/// `post_actions_complete` marks the true end of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current execution status
    pub status: ExecutionStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the stage sequence finished (verdict recorded)
    pub finished_at: Option<DateTime<Utc>>,

    /// Whether the post-action lists have been executed
    pub post_actions_complete: bool,
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            started_at: None,
            finished_at: None,
            post_actions_complete: false,
        }
    }

    /// Mark the run as started
    pub fn start(&mut self) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Record a successful verdict
    pub fn succeed(&mut self) {
        self.status = ExecutionStatus::Succeeded;
        self.finished_at = Some(Utc::now());
    }

    /// Record a failed verdict
    pub fn fail(&mut self) {
        self.status = ExecutionStatus::Failed;
        self.finished_at = Some(Utc::now());
    }

    /// Record a cancelled verdict
    pub fn cancel(&mut self) {
        self.status = ExecutionStatus::Cancelled;
        self.finished_at = Some(Utc::now());
    }

    /// Mark the post-action lists as executed (terminal)
    pub fn finish_post_actions(&mut self) {
        self.post_actions_complete = true;
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_terminal() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Succeeded.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_state_transitions() {
        let mut state = PipelineState::new();
        assert_eq!(state.status, ExecutionStatus::Pending);
        assert!(state.started_at.is_none());

        state.start();
        assert_eq!(state.status, ExecutionStatus::Running);
        assert!(state.started_at.is_some());
        assert!(state.finished_at.is_none());

        state.fail();
        assert_eq!(state.status, ExecutionStatus::Failed);
        assert!(state.finished_at.is_some());
        assert!(!state.post_actions_complete);

        // Verdict is not changed by finishing post-actions
        state.finish_post_actions();
        assert_eq!(state.status, ExecutionStatus::Failed);
        assert!(state.post_actions_complete);
    }
}
