//! Explicit runtime configuration
//!
//! Built once by the host (defaults, or YAML) and passed into constructors.
//! The library never reads the environment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Workflow engine policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Composite score at or above which a session escalates
    pub escalation_threshold: u32,
    /// Supervise never loops once this many iterations have run
    pub max_iterations: u32,
    pub critical_channel: String,
    pub warning_channel: String,
    /// Signal name → equipment id. A critical breach on an interlocked
    /// signal plans a gated emergency stop of that equipment.
    pub interlocks: BTreeMap<String, String>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: 85,
            max_iterations: 5,
            critical_channel: "slack".to_string(),
            warning_channel: "teams".to_string(),
            interlocks: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path; in-memory store when unset
    pub sqlite_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workflow: WorkflowConfig,
    pub storage: StorageConfig,
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workflow.max_iterations == 0 {
            return Err(ConfigError::Invalid("workflow.max_iterations must be at least 1".into()));
        }
        if self.workflow.escalation_threshold > 100 {
            return Err(ConfigError::Invalid(
                "workflow.escalation_threshold must be within 0..=100".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_policy() {
        let config = Config::default();
        assert_eq!(config.workflow.escalation_threshold, 85);
        assert_eq!(config.workflow.max_iterations, 5);
        assert_eq!(config.workflow.critical_channel, "slack");
        assert!(config.storage.sqlite_path.is_none());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = Config::from_yaml_str(
            "workflow:\n  escalation_threshold: 70\n  interlocks:\n    vibration: P-101\n",
        )
        .unwrap();
        assert_eq!(config.workflow.escalation_threshold, 70);
        assert_eq!(config.workflow.max_iterations, 5);
        assert_eq!(config.workflow.interlocks["vibration"], "P-101");
    }

    #[test]
    fn zero_iterations_is_invalid() {
        let err = Config::from_yaml_str("workflow:\n  max_iterations: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load("/no/such/safetwin.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
