//! Handler configuration
//!
//! Loaded from a JSON file. Every field is optional; missing fields take
//! their defaults. Invalid values are rejected at load time.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::Severity;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables of a handle manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Upper bound on transparent re-opens within one read (none = retry until success)
    #[serde(default)]
    pub max_reopen_attempts: Option<u32>,

    /// Rows returned by a read that names no limit
    #[serde(default = "default_read_limit")]
    pub default_read_limit: u64,

    /// Initial capacity of the per-session handle cache
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,

    /// Minimum log severity: trace, info, warn or error
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_read_limit() -> u64 {
    1
}
fn default_initial_capacity() -> usize {
    120
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            max_reopen_attempts: None,
            default_read_limit: default_read_limit(),
            initial_capacity: default_initial_capacity(),
            log_level: default_log_level(),
        }
    }
}

impl HandlerConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration from JSON text
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: HandlerConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_read_limit == 0 {
            return Err(ConfigError::Invalid(
                "default_read_limit must be > 0".to_string(),
            ));
        }
        if self.max_reopen_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "max_reopen_attempts must be > 0 when set".to_string(),
            ));
        }
        self.severity()?;
        Ok(())
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> Result<Severity, ConfigError> {
        self.log_level.parse().map_err(ConfigError::Invalid)
    }
}
