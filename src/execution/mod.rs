//! Pipeline execution

pub mod engine;
pub mod executor;
pub mod result;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent};
pub use executor::{CommandRunner, ExecError, ProcessRunner};
pub use result::{CommandOutcome, CommandResult, PipelineResult, StageResult};
