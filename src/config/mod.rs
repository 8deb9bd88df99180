//! Configuration management for Tidings.
//!
//! Configuration is read from `~/.config/tidings/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use crate::fetcher::parallel::DEFAULT_WORKERS;
use crate::notify::NotificationConfig;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub notifications: NotificationConfig,
    pub update: UpdateConfig,
}

/// Feed refresh settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpdateConfig {
    /// Feeds fetched concurrently
    pub workers: usize,
    /// Daemon update interval, e.g. "30m", "1h", "1d"
    pub interval: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            interval: "1h".into(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/tidings/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("tidings").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> &'static str {
        r##"# Tidings Configuration

[notifications]
# Post notifications after each update
enabled = true

# With this many new items or more, a single "Updated feeds" notification
# lists them all instead of one notification per item
bundle_threshold = 4

# Set when your notification daemon groups notifications by itself;
# items are then never bundled
auto_grouping = false

# Action buttons on item notifications
open_enclosure_action = true
open_in_browser_action = true
mark_as_read_action = true

[update]
# Feeds fetched in parallel
workers = 10

# Interval between daemon updates ("30m", "1h", "6h", "1d")
interval = "1h"
"##
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
