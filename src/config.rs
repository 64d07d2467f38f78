//! Engine Configuration
//!
//! Every field has a default, so `{}` is a complete configuration. The layer
//! policy is deliberately absent: it is not configurable.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::resolver::{default_heuristics, PathRewrite};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: heuristic list is empty")]
    NoHeuristics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
    #[serde(default = "default_heuristics")]
    pub heuristics: Vec<PathRewrite>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { heuristics: default_heuristics() }
    }
}

/// Toggles for advisory rules. Presence, reference and layer checks always run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesConfig {
    #[serde(default)]
    pub missing_type: RuleConfig,
    #[serde(default)]
    pub literal_value: RuleConfig,
    #[serde(default)]
    pub naming_convention: RuleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool { true }

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        if config.resolver.heuristics.is_empty() {
            return Err(ConfigError::NoHeuristics);
        }
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}
