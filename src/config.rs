//! User settings read from `~/.courier/config.yaml`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_LOG_FILE, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::runner::RunConfig;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub stop_on_failure: bool,
    pub delay_ms: i64,
    pub request_timeout_secs: u64,
    pub log_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            stop_on_failure: false,
            delay_ms: 0,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl AppConfig {
    /// Directory holding the config file, collections and reports
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
    }

    /// Loads the config from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_dir().join(CONFIG_FILE_NAME))
    }

    /// A missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Defaults for a new run; validated again when the run starts
    pub fn run_config(&self) -> RunConfig {
        RunConfig::new(self.stop_on_failure, self.delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
