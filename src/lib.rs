//! stagerun - a minimal CI stage runner

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use crate::core::{Command, ExecutionStatus, Pipeline, PipelineState, Stage, StageStatus};
pub use crate::execution::{
    CommandOutcome, CommandResult, CommandRunner, ExecError, ExecutionEngine, ExecutionEvent,
    PipelineResult, ProcessRunner, StageResult,
};
pub use crate::persistence::{create_summary, PersistenceBackend, RunSummary};
