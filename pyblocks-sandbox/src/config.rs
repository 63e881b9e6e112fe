//! Configuration management for pyblocks

use crate::error::ConfigError;
use crate::source::DEFAULT_STORAGE_KEY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Interpreter worker configuration
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Program storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Interpreter worker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Python executable used for the worker
    #[serde(default = "WorkerConfig::default_python")]
    pub python: String,
    /// How long the interpreter may take to load
    #[serde(default = "WorkerConfig::default_boot_timeout", with = "humantime_serde")]
    pub boot_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            python: Self::default_python(),
            boot_timeout: Self::default_boot_timeout(),
        }
    }
}

impl WorkerConfig {
    fn default_python() -> String {
        "python3".to_string()
    }

    fn default_boot_timeout() -> Duration {
        Duration::from_secs(30)
    }
}

/// Program storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the JSON storage file
    #[serde(default = "StorageConfig::default_path")]
    pub path: String,
    /// Key the generated program is stored under
    #[serde(default = "StorageConfig::default_key")]
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            key: Self::default_key(),
        }
    }
}

impl StorageConfig {
    fn default_path() -> String {
        "~/.local/share/pyblocks/storage.json".to_string()
    }

    fn default_key() -> String {
        DEFAULT_STORAGE_KEY.to_string()
    }

    /// Get the expanded storage file path
    pub fn resolved_path(&self) -> Result<PathBuf, ConfigError> {
        expand_path(&self.path)
    }
}

impl AppConfig {
    /// Load configuration from the default location, creating it if missing,
    /// then apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file, creating it with defaults if
    /// it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Write)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(ConfigError::Write)?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHome)?;
        Ok(home.join(".config").join("pyblocks").join("config.toml"))
    }

    /// Environment variables take precedence over the config file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(python) = std::env::var("PYBLOCKS_PYTHON") {
            if !python.trim().is_empty() {
                self.worker.python = python;
            }
        }
        if let Ok(store) = std::env::var("PYBLOCKS_STORE") {
            if !store.trim().is_empty() {
                self.storage.path = store;
            }
        }
    }
}

fn expand_path(path: &str) -> Result<PathBuf, ConfigError> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or(ConfigError::NoHome)?;
        Ok(home.join(rest))
    } else if path == "~" {
        dirs::home_dir().ok_or(ConfigError::NoHome)
    } else {
        Ok(PathBuf::from(path))
    }
}
