//! Configuration file management.
//!
//! Settings live in `lifeline/config.toml` under the platform config
//! directory and are overridden by command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lifeline_core::ManagerConfig;

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Maximum number of simultaneous tag links.
    #[serde(default)]
    pub capacity: Option<usize>,

    /// Proximity threshold in dBm; weaker advertisers are ignored.
    #[serde(default)]
    pub proximity_threshold_dbm: Option<i16>,

    /// Emit link events as JSON lines on stdout.
    #[serde(default)]
    pub json_events: bool,
}

impl Config {
    /// Get the default config file path.
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lifeline")
            .join("config.toml")
    }

    /// Load config from `path`, or return defaults if the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Fold file settings and flag overrides into a manager configuration.
    pub fn manager_config(
        &self,
        capacity: Option<usize>,
        threshold: Option<i16>,
    ) -> ManagerConfig {
        let mut config = ManagerConfig::default();
        if let Some(capacity) = capacity.or(self.capacity) {
            config = config.capacity(capacity);
        }
        if let Some(threshold) = threshold.or(self.proximity_threshold_dbm) {
            config = config.proximity_threshold_dbm(threshold);
        }
        config
    }
}
