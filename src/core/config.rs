//! Pipeline configuration from YAML

use crate::core::Pipeline;
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Stage names must look like plain identifiers so they stay usable in
/// reports, history queries, and log lines.
const STAGE_NAME_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._-]*$";

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Host/label selection - recorded for the report, never interpreted
    #[serde(default)]
    pub agent: Option<String>,

    /// Global environment mapping, merged beneath stage and command overrides
    #[serde(default)]
    pub environment: HashMap<String, String>,

    /// Default timeout applied to commands without their own (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Ordered stage definitions
    pub stages: Vec<StageConfig>,

    /// Post-action command lists
    #[serde(default)]
    pub post: Option<PostConfig>,
}

/// Stage configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage name, unique within the pipeline
    pub name: String,

    /// Optional stage description
    #[serde(default)]
    pub description: Option<String>,

    /// Stage-level environment additions (beneath per-command overrides)
    #[serde(default)]
    pub environment: HashMap<String, String>,

    /// Ordered command list
    #[serde(default)]
    pub commands: Vec<CommandConfig>,
}

/// Command configuration - either a shell line or a structured spec
///
/// The string form explicitly requests shell interpretation and runs via
/// `sh -c`. The structured form passes program and arguments verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandConfig {
    /// `- "pip install -e ."`
    Shell(String),

    /// `- program: python` with optional args/env/cwd/timeout
    Exec {
        program: String,

        #[serde(default)]
        args: Vec<String>,

        #[serde(default)]
        env: HashMap<String, String>,

        #[serde(default)]
        cwd: Option<PathBuf>,

        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

/// Post-action command lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostConfig {
    /// Run unconditionally after the stage sequence completes or fails
    #[serde(default)]
    pub always: Vec<CommandConfig>,

    /// Run only if a stage failed, after `always`
    #[serde(default)]
    pub on_failure: Vec<CommandConfig>,
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        if self.default_timeout_secs == Some(0) {
            anyhow::bail!("default_timeout_secs must be greater than zero");
        }

        let name_pattern = Regex::new(STAGE_NAME_PATTERN)?;

        // Stage names must be unique and identifier-like
        let mut seen_names = HashSet::new();
        for stage in &self.stages {
            if !name_pattern.is_match(&stage.name) {
                anyhow::bail!("Invalid stage name: '{}'", stage.name);
            }
            if !seen_names.insert(&stage.name) {
                anyhow::bail!("Duplicate stage name: {}", stage.name);
            }

            for command in &stage.commands {
                Self::validate_command(command, &stage.name)?;
            }
        }

        if let Some(post) = &self.post {
            for command in post.always.iter().chain(post.on_failure.iter()) {
                Self::validate_command(command, "post")?;
            }
        }

        Ok(())
    }

    fn validate_command(command: &CommandConfig, location: &str) -> Result<()> {
        match command {
            CommandConfig::Shell(line) => {
                if line.trim().is_empty() {
                    anyhow::bail!("Empty shell command in '{}'", location);
                }
            }
            CommandConfig::Exec {
                program,
                timeout_secs,
                ..
            } => {
                if program.trim().is_empty() {
                    anyhow::bail!("Command in '{}' has an empty program", location);
                }
                if *timeout_secs == Some(0) {
                    anyhow::bail!(
                        "Command '{}' in '{}' has a zero timeout",
                        program,
                        location
                    );
                }
            }
        }
        Ok(())
    }

    /// Total number of commands across all stages
    pub fn command_count(&self) -> usize {
        self.stages.iter().map(|s| s.commands.len()).sum()
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_pipeline() {
        let yaml = r#"
name: "Package CI"
stages:
  - name: install
    commands:
      - "pip install -e ."
  - name: test
    commands:
      - program: python
        args: ["-m", "pytest", "tests/"]
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name, "Package CI");
        assert_eq!(config.stages.len(), 2);
        assert_eq!(config.command_count(), 2);
        assert!(config.post.is_none());
    }

    #[test]
    fn test_parse_post_actions_and_environment() {
        let yaml = r#"
name: "Package CI"
agent: "linux"
environment:
  CONDA_ENV: "ci-env"
default_timeout_secs: 600
stages:
  - name: test
    environment:
      PYTEST_ADDOPTS: "-q"
    commands:
      - "python -m pytest"
post:
  always:
    - "conda env remove -n $CONDA_ENV -y"
  on_failure:
    - "echo build failed"
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.agent.as_deref(), Some("linux"));
        assert_eq!(
            config.environment.get("CONDA_ENV"),
            Some(&"ci-env".to_string())
        );
        assert_eq!(config.default_timeout_secs, Some(600));

        let post = config.post.unwrap();
        assert_eq!(post.always.len(), 1);
        assert_eq!(post.on_failure.len(), 1);
    }

    #[test]
    fn test_stage_with_no_commands_is_valid() {
        let yaml = r#"
name: "Empty Stage"
stages:
  - name: noop
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert!(config.stages[0].commands.is_empty());
    }

    #[test]
    fn test_duplicate_stage_name_fails() {
        let yaml = r#"
name: "Dup"
stages:
  - name: build
    commands: ["true"]
  - name: build
    commands: ["true"]
"#;

        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_stage_name_fails() {
        let yaml = r#"
name: "Bad Name"
stages:
  - name: "has spaces"
    commands: ["true"]
"#;

        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_empty_program_fails() {
        let yaml = r#"
name: "Bad Command"
stages:
  - name: build
    commands:
      - program: ""
"#;

        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_zero_timeout_fails() {
        let yaml = r#"
name: "Bad Timeout"
stages:
  - name: build
    commands:
      - program: "sleep"
        args: ["10"]
        timeout_secs: 0
"#;

        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_empty_shell_line_fails() {
        let yaml = r#"
name: "Blank"
stages:
  - name: build
    commands:
      - "   "
"#;

        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }
}
