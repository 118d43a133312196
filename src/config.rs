//! YAML configuration file support.
//!
//! All tunables of the matching engine live in one YAML document. The
//! scoring weights are fixed and deliberately absent here.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "staging"
//!
//! scoring:
//!   variety_seed: 42          # omit for a fresh entropy seed per session
//!
//! session:
//!   undo_mode: "compatible"   # or "full_reversal"
//!   compensate_partial_match: true
//!
//! logging:
//!   level: "info"
//!   json: false
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{SessionConfig, UndoPolicy};

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct RoomieConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub scoring: ScoringYamlConfig,

    #[serde(default)]
    pub session: SessionYamlConfig,

    #[serde(default)]
    pub logging: LoggingYamlConfig,
}

impl RoomieConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: RoomieConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.logging.validate()?;
        Ok(())
    }

    /// Session settings derived from this document.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            undo_policy: self.session.undo_mode,
            compensate_partial_match: self.session.compensate_partial_match,
            variety_seed: self.scoring.variety_seed,
        }
    }
}

impl Default for RoomieConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            scoring: ScoringYamlConfig::default(),
            session: SessionYamlConfig::default(),
            logging: LoggingYamlConfig::default(),
        }
    }
}

/// Scoring YAML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoringYamlConfig {
    /// Seed for the variety term; reproducible rankings when set.
    #[serde(default)]
    pub variety_seed: Option<u64>,
}

/// Session YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionYamlConfig {
    #[serde(default)]
    pub undo_mode: UndoPolicy,

    #[serde(default = "true_value")]
    pub compensate_partial_match: bool,
}

impl Default for SessionYamlConfig {
    fn default() -> Self {
        Self {
            undo_mode: UndoPolicy::Compatible,
            compensate_partial_match: true,
        }
    }
}

/// Logging YAML configuration, consumed by the `roomie` binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingYamlConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl LoggingYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&self.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigLoadError::Validation(format!(
                "logging.level must be one of: {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

impl Default for LoggingYamlConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn true_value() -> bool {
    true
}
