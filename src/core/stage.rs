//! Stage domain model

use crate::core::{config::StageConfig, Command};
use std::collections::HashMap;
use std::time::Duration;

/// A named, ordered group of commands representing one pipeline phase
///
/// A stage succeeds only if every command succeeds, evaluated in order,
/// stopping at the first failure. A stage with zero commands trivially
/// succeeds.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Stage name, unique within the pipeline
    pub name: String,

    /// Stage-level environment additions
    pub environment: HashMap<String, String>,

    /// Ordered command list
    pub commands: Vec<Command>,
}

impl Stage {
    /// Create a stage from a stage config
    pub fn from_config(config: &StageConfig, default_timeout: Option<Duration>) -> Self {
        let commands = config
            .commands
            .iter()
            .map(|c| Command::from_config(c, default_timeout))
            .collect();

        Stage {
            name: config.name.clone(),
            environment: config.environment.clone(),
            commands,
        }
    }

    /// Compute the environment the stage's commands run under
    ///
    /// Stage additions win over the shared mapping; per-command overrides are
    /// applied later, on top of this.
    pub fn effective_env(&self, shared: &HashMap<String, String>) -> HashMap<String, String> {
        let mut env = shared.clone();
        env.extend(
            self.environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        env
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
