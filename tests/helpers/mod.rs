//! Test utility functions for stagerun

use async_trait::async_trait;
use chrono::Utc;
use stagerun::core::config::PipelineConfig;
use stagerun::core::Command;
use stagerun::execution::{
    CommandOutcome, CommandResult, CommandRunner, ExecError, ExecutionEngine, ExecutionEvent,
    PipelineResult,
};
use stagerun::Pipeline;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Mock runner with scripted exit codes per command line
///
/// Commands not mentioned succeed with exit code 0. Command lines are
/// recorded in call order.
pub struct MockRunner {
    exit_codes: HashMap<String, i32>,
    host_errors: HashSet<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            exit_codes: HashMap::new(),
            host_errors: HashSet::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script a non-zero exit for a command line
    pub fn fail(mut self, command: &str, code: i32) -> Self {
        self.exit_codes.insert(command.to_string(), code);
        self
    }

    /// Script a host-level spawn error for a command line
    pub fn host_error(mut self, command: &str) -> Self {
        self.host_errors.insert(command.to_string());
        self
    }

    /// Handle on the recorded call list
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        command: &Command,
        _shared_env: &HashMap<String, String>,
    ) -> Result<CommandResult, ExecError> {
        let display = command.display();

        if self.host_errors.contains(&display) {
            return Err(ExecError::NotFound {
                program: command.program.clone(),
            });
        }

        self.calls.lock().unwrap().push(display.clone());

        let code = self.exit_codes.get(&display).copied().unwrap_or(0);
        Ok(CommandResult {
            command: display,
            outcome: CommandOutcome::Exited { code },
            stdout: String::new(),
            stderr: String::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        })
    }
}

/// Outcome of a mocked pipeline run, with the recorded call order
pub struct MockRunOutcome {
    pub result: PipelineResult,
    pub pipeline: Pipeline,
    pub calls: Vec<String>,
    pub events: Vec<ExecutionEvent>,
}

impl MockRunOutcome {
    /// Number of times a command line was executed
    pub fn count_calls(&self, command: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == command).count()
    }
}

/// Parse a pipeline from YAML and run it against a mock runner
pub async fn run_pipeline_with_mock(
    yaml: &str,
    runner: MockRunner,
) -> Result<MockRunOutcome, ExecError> {
    let config = PipelineConfig::from_yaml(yaml).expect("pipeline YAML should parse");
    let mut pipeline = config.to_pipeline();

    let calls = runner.calls();
    let events: Arc<Mutex<Vec<ExecutionEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let events_sink = events.clone();

    let mut engine = ExecutionEngine::new(runner);
    engine.add_event_handler(move |event| {
        events_sink.lock().unwrap().push(event);
    });

    let result = engine.execute(&mut pipeline).await?;

    let calls = calls.lock().unwrap().clone();
    let events = events.lock().unwrap().clone();
    Ok(MockRunOutcome {
        result,
        pipeline,
        calls,
        events,
    })
}
