//! User settings
//!
//! Stored as JSON next to the other per-user configuration:
//! - Linux: ~/.config/image-selector/settings.json
//! - macOS: ~/Library/Application Support/image-selector/settings.json
//! - Windows: %APPDATA%\image-selector\settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::resolver::cache::DEFAULT_CAPACITY;
use crate::state::data::TransferMode;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// How long the capability probe waits for the decoder (milliseconds)
    pub probe_timeout_ms: u64,
    /// Number of resolved display URIs kept in memory
    pub uri_cache_capacity: usize,
    /// Resolve the next image in the background after each navigation
    pub preload_next: bool,
    /// Create the target folder before a transfer
    pub create_target_directory: bool,
    /// Mode preselected in the batch dialog
    pub default_transfer_mode: TransferMode,
    /// `error`, `warn`, `info`, `debug` or `trace`
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 1000,
            uri_cache_capacity: DEFAULT_CAPACITY,
            preload_next: true,
            create_target_directory: true,
            default_transfer_mode: TransferMode::Copy,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Get the path where the settings file should be stored
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir().or_else(dirs::home_dir)?;
        path.push("image-selector");
        path.push("settings.json");
        Some(path)
    }

    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Write to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_error)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "probe_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.uri_cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "uri_cache_capacity must be greater than zero".to_string(),
            ));
        }
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown log_level {:?}",
                self.log_level
            )));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
