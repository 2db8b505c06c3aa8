//! Pipeline domain model

use crate::core::{
    command::Command,
    config::PipelineConfig,
    stage::Stage,
    state::PipelineState,
};
use std::collections::HashMap;
use std::time::Duration;

/// A pipeline definition
///
/// Constructed once from configuration, executed exactly once, then
/// discarded. Stages run strictly in declared order.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Host/label selection, carried into the report but not interpreted
    pub agent: Option<String>,

    /// Shared environment mapping, read-only during a run
    pub environment: HashMap<String, String>,

    /// Ordered stage sequence
    pub stages: Vec<Stage>,

    /// Commands run unconditionally after the stage sequence
    pub always: Vec<Command>,

    /// Commands run only if a stage failed, after `always`
    pub on_failure: Vec<Command>,

    /// Execution state
    pub state: PipelineState,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let default_timeout = config.default_timeout_secs.map(Duration::from_secs);

        let stages = config
            .stages
            .iter()
            .map(|stage_config| Stage::from_config(stage_config, default_timeout))
            .collect();

        let (always, on_failure) = match &config.post {
            Some(post) => (
                post.always
                    .iter()
                    .map(|c| Command::from_config(c, default_timeout))
                    .collect(),
                post.on_failure
                    .iter()
                    .map(|c| Command::from_config(c, default_timeout))
                    .collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };

        Pipeline {
            name: config.name.clone(),
            agent: config.agent.clone(),
            environment: config.environment.clone(),
            stages,
            always,
            on_failure,
            state: PipelineState::new(),
        }
    }

    /// Get a stage by name
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_from_config() {
        let yaml = r#"
name: "Package CI"
default_timeout_secs: 120
stages:
  - name: install
    commands:
      - "pip install -e ."
  - name: test
    commands:
      - "python -m pytest"
post:
  always:
    - "rm -rf build/"
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        let pipeline = config.to_pipeline();

        assert_eq!(pipeline.stage_names(), vec!["install", "test"]);
        assert_eq!(pipeline.always.len(), 1);
        assert!(pipeline.on_failure.is_empty());
        assert_eq!(
            pipeline.stages[0].commands[0].timeout,
            Some(Duration::from_secs(120))
        );
        // Post-actions get the default timeout too
        assert_eq!(pipeline.always[0].timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_stage_lookup() {
        let yaml = r#"
name: "Lookup"
stages:
  - name: build
    commands: ["true"]
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        let pipeline = config.to_pipeline();

        assert!(pipeline.stage("build").is_some());
        assert!(pipeline.stage("deploy").is_none());
    }
}
