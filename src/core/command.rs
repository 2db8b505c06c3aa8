//! Command domain model - the unit of work a stage runs

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::config::CommandConfig;

/// A single external command
///
/// Immutable once constructed. Arguments are opaque strings passed to the
/// program verbatim; shell interpretation happens only for commands written
/// as a bare string in the configuration, which run through `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Executable name or path
    pub program: String,

    /// Ordered argument list
    pub args: Vec<String>,

    /// Environment variable overrides (win over the shared mapping)
    pub env: HashMap<String, String>,

    /// Working directory, if different from the runner's
    pub cwd: Option<PathBuf>,

    /// Wall-clock limit; the process is killed when it elapses
    pub timeout: Option<Duration>,
}

impl Command {
    /// Create a command that runs a shell line via `sh -c`
    pub fn shell(line: impl Into<String>) -> Self {
        Self {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), line.into()],
            env: HashMap::new(),
            cwd: None,
            timeout: None,
        }
    }

    /// Create a command that executes a program directly, no shell involved
    pub fn exec(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: HashMap::new(),
            cwd: None,
            timeout: None,
        }
    }

    /// Build a command from its configuration form
    pub fn from_config(config: &CommandConfig, default_timeout: Option<Duration>) -> Self {
        match config {
            CommandConfig::Shell(line) => {
                let mut command = Self::shell(line.clone());
                command.timeout = default_timeout;
                command
            }
            CommandConfig::Exec {
                program,
                args,
                env,
                cwd,
                timeout_secs,
            } => Self {
                program: program.clone(),
                args: args.clone(),
                env: env.clone(),
                cwd: cwd.clone(),
                timeout: timeout_secs.map(Duration::from_secs).or(default_timeout),
            },
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Merge the shared environment mapping with this command's overrides
    ///
    /// Command overrides win on conflict. The result is passed explicitly to
    /// the spawn; no ambient process state is mutated between commands.
    pub fn merged_env(&self, shared: &HashMap<String, String>) -> HashMap<String, String> {
        let mut env = shared.clone();
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    /// One-line rendering for logs and reports
    pub fn display(&self) -> String {
        // Shell commands read better as the original line
        if self.program == "sh" && self.args.len() == 2 && self.args[0] == "-c" {
            return self.args[1].clone();
        }

        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}
