//! CLI configuration management
//!
//! A TOML file with optional `[executor]` and `[workload]` tables:
//!
//! ```toml
//! [executor]
//! algorithm = "optimized-hash"
//! dispatch = "waves"
//! batch_timeout_ms = 5000
//!
//! [workload]
//! tasks = 2000
//! addresses = 64
//! seed = 42
//! ```

use bach_executor::ExecutorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::workload::WorkloadConfig;
use crate::CliError;

/// CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Executor settings
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Workload generator settings
    #[serde(default)]
    pub workload: WorkloadConfig,
}

impl Config {
    /// Load config from `path`, or the defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Self::from_toml(&content)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from TOML text
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }

    /// Render config as TOML
    pub fn to_toml(&self) -> Result<String, CliError> {
        toml::to_string_pretty(self).map_err(|e| CliError::InvalidInput(e.to_string()))
    }

    /// Check both sections
    pub fn validate(&self) -> Result<(), CliError> {
        self.executor.validate()?;
        self.workload.validate()
    }
}
