//! Main execution engine - drives the stage sequence and post-actions

use crate::{
    core::{Command, ExecutionStatus, Pipeline, StageStatus},
    execution::{
        executor::{CommandRunner, ExecError},
        result::{CommandResult, PipelineResult, StageResult},
    },
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events that can occur during a pipeline run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        run_id: Uuid,
        pipeline_name: String,
    },
    StageStarted {
        stage: String,
    },
    CommandStarted {
        stage: String,
        command: String,
    },
    CommandOutput {
        stage: String,
        command: String,
        output: String,
    },
    CommandFinished {
        stage: String,
        command: String,
        success: bool,
        duration_ms: u64,
    },
    StageSucceeded {
        stage: String,
    },
    StageFailed {
        stage: String,
        command: String,
        detail: String,
    },
    StageSkipped {
        stage: String,
    },
    PostActionStarted {
        command: String,
    },
    PostActionFailed {
        command: String,
        detail: String,
    },
    PipelineCompleted {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Runs a pipeline to completion: stages in order, short-circuit on the
/// first failure, then the post-action lists. Everything is strictly
/// sequential; the only early exit is a host-level [`ExecError`], which
/// bypasses even post-actions.
pub struct ExecutionEngine<R> {
    runner: R,
    event_handlers: Vec<EventHandler>,
    cancelled: Arc<AtomicBool>,
}

impl<R: CommandRunner> ExecutionEngine<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            event_handlers: Vec::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Flag for cooperative cancellation, checked between stages
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn emit(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Execute the entire pipeline and produce its report
    pub async fn execute(&self, pipeline: &mut Pipeline) -> Result<PipelineResult, ExecError> {
        let run_id = pipeline.state.run_id;
        info!("Starting pipeline run: {} ({})", pipeline.name, run_id);
        self.emit(ExecutionEvent::PipelineStarted {
            run_id,
            pipeline_name: pipeline.name.clone(),
        });

        pipeline.state.start();
        let started_at = pipeline.state.started_at.unwrap_or_else(Utc::now);
        let shared_env = pipeline.environment.clone();

        let mut stage_results: Vec<StageResult> = Vec::with_capacity(pipeline.stages.len());
        let mut failed = false;
        let mut cancelled = false;

        for stage in &pipeline.stages {
            // A single failure is fatal to the remaining sequence
            if failed || cancelled {
                self.emit(ExecutionEvent::StageSkipped {
                    stage: stage.name.clone(),
                });
                stage_results.push(StageResult::skipped(&stage.name));
                continue;
            }

            // Cancellation takes effect only between stages
            if self.cancelled.load(Ordering::SeqCst) {
                warn!("Run cancelled before stage '{}'", stage.name);
                cancelled = true;
                self.emit(ExecutionEvent::StageSkipped {
                    stage: stage.name.clone(),
                });
                stage_results.push(StageResult::skipped(&stage.name));
                continue;
            }

            self.emit(ExecutionEvent::StageStarted {
                stage: stage.name.clone(),
            });
            info!("Stage '{}' started", stage.name);

            let stage_env = stage.effective_env(&shared_env);
            let mut command_results = Vec::with_capacity(stage.commands.len());
            let mut stage_failed = false;

            for command in &stage.commands {
                let display = command.display();
                self.emit(ExecutionEvent::CommandStarted {
                    stage: stage.name.clone(),
                    command: display.clone(),
                });

                let result = self.runner.run(command, &stage_env).await?;

                if !result.stdout.is_empty() {
                    self.emit(ExecutionEvent::CommandOutput {
                        stage: stage.name.clone(),
                        command: display.clone(),
                        output: result.stdout.clone(),
                    });
                }
                self.emit(ExecutionEvent::CommandFinished {
                    stage: stage.name.clone(),
                    command: display.clone(),
                    success: result.success(),
                    duration_ms: result.duration_ms,
                });

                let ok = result.success();
                command_results.push(result);

                if !ok {
                    stage_failed = true;
                    break;
                }
            }

            if stage_failed {
                failed = true;
                // Safe: stage_failed is only set after a push
                let failing = &command_results[command_results.len() - 1];
                let detail = failing.failure_detail();
                warn!("Stage '{}' failed: {}", stage.name, detail);
                self.emit(ExecutionEvent::StageFailed {
                    stage: stage.name.clone(),
                    command: failing.command.clone(),
                    detail,
                });
                stage_results.push(StageResult {
                    name: stage.name.clone(),
                    status: StageStatus::Failed,
                    commands: command_results,
                });
            } else {
                info!("Stage '{}' succeeded", stage.name);
                self.emit(ExecutionEvent::StageSucceeded {
                    stage: stage.name.clone(),
                });
                stage_results.push(StageResult {
                    name: stage.name.clone(),
                    status: StageStatus::Succeeded,
                    commands: command_results,
                });
            }
        }

        if cancelled {
            pipeline.state.cancel();
        } else if failed {
            pipeline.state.fail();
        } else {
            pipeline.state.succeed();
        }
        let status = pipeline.state.status;

        // Cleanup must always run; its failures never change the verdict
        let always_results = self.run_post_actions(&pipeline.always, &shared_env).await?;
        let on_failure_results = if failed {
            self.run_post_actions(&pipeline.on_failure, &shared_env)
                .await?
        } else {
            Vec::new()
        };

        pipeline.state.finish_post_actions();

        info!("Pipeline run finished: {} - {:?}", pipeline.name, status);
        self.emit(ExecutionEvent::PipelineCompleted { run_id, status });

        Ok(PipelineResult {
            run_id,
            pipeline_name: pipeline.name.clone(),
            agent: pipeline.agent.clone(),
            status,
            started_at,
            finished_at: Utc::now(),
            stages: stage_results,
            always: always_results,
            on_failure: on_failure_results,
        })
    }

    /// Run one post-action list
    ///
    /// Every command in the list runs even if an earlier one failed; the
    /// list is cleanup, not a stage. Host-level spawn errors still abort.
    async fn run_post_actions(
        &self,
        commands: &[Command],
        shared_env: &HashMap<String, String>,
    ) -> Result<Vec<CommandResult>, ExecError> {
        let mut results = Vec::with_capacity(commands.len());

        for command in commands {
            let display_str = command.display();
            self.emit(ExecutionEvent::PostActionStarted {
                command: display_str.clone(),
            });

            let result = self.runner.run(command, shared_env).await?;

            if !result.success() {
                let detail = result.failure_detail();
                warn!("Post-action failed: {} ({})", display_str, detail);
                self.emit(ExecutionEvent::PostActionFailed {
                    command: display_str,
                    detail,
                });
            }

            results.push(result);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PipelineConfig;

    /// Runner that records command lines and scripts their exit codes
    struct ScriptedRunner {
        exit_codes: HashMap<String, i32>,
        seen: std::sync::Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(exit_codes: &[(&str, i32)]) -> Self {
            Self {
                exit_codes: exit_codes
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect(),
                seen: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            command: &Command,
            _shared_env: &HashMap<String, String>,
        ) -> Result<CommandResult, ExecError> {
            let display = command.display();
            self.seen.lock().unwrap().push(display.clone());
            let code = self.exit_codes.get(&display).copied().unwrap_or(0);
            Ok(CommandResult {
                command: display,
                outcome: crate::execution::result::CommandOutcome::Exited { code },
                stdout: String::new(),
                stderr: String::new(),
                started_at: Utc::now(),
                duration_ms: 0,
            })
        }
    }

    fn two_stage_pipeline() -> Pipeline {
        let yaml = r#"
name: "Engine Test"
stages:
  - name: install
    commands: ["install-cmd"]
  - name: test
    commands: ["test-cmd"]
post:
  always: ["cleanup-cmd"]
  on_failure: ["notify-cmd"]
"#;
        PipelineConfig::from_yaml(yaml).unwrap().to_pipeline()
    }

    #[tokio::test]
    async fn test_all_stages_succeed() {
        let mut pipeline = two_stage_pipeline();
        let engine = ExecutionEngine::new(ScriptedRunner::new(&[]));

        let result = engine.execute(&mut pipeline).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Succeeded);
        assert_eq!(result.stages_succeeded(), 2);
        assert_eq!(result.always.len(), 1);
        assert!(result.on_failure.is_empty());
        assert!(pipeline.state.post_actions_complete);
    }

    #[tokio::test]
    async fn test_first_stage_failure_skips_rest() {
        let mut pipeline = two_stage_pipeline();
        let runner = ScriptedRunner::new(&[("install-cmd", 1)]);
        let engine = ExecutionEngine::new(runner);

        let result = engine.execute(&mut pipeline).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Failed);
        assert_eq!(result.stages[0].status, StageStatus::Failed);
        assert_eq!(result.stages[1].status, StageStatus::Skipped);
        assert!(result.stages[1].commands.is_empty());
        // Both post lists ran, on_failure after always
        assert_eq!(result.always.len(), 1);
        assert_eq!(result.on_failure.len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_between_stages() {
        let mut pipeline = two_stage_pipeline();
        let engine = ExecutionEngine::new(ScriptedRunner::new(&[]));
        engine.cancel_flag().store(true, Ordering::SeqCst);

        let result = engine.execute(&mut pipeline).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Cancelled);
        assert!(result
            .stages
            .iter()
            .all(|s| s.status == StageStatus::Skipped));
        // always still runs on cancellation, on_failure does not
        assert_eq!(result.always.len(), 1);
        assert!(result.on_failure.is_empty());
    }
}
