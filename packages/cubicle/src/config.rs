//! Runtime configuration, loaded from JSON.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cubicle_mainthread::MainThreadConfig;
use cubicle_protocol::upload::MAX_FILES;
use cubicle_protocol::UploadLimits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {error}")]
    Io { path: PathBuf, error: io::Error },

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings shared by every computer. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CubicleConfig {
    /// Main-thread time all computers share per tick.
    pub max_main_global_time_ms: u64,
    /// Main-thread time one computer may use per tick.
    pub max_main_computer_time_ms: u64,
    /// Disk space of each computer, in bytes.
    pub computer_space_limit: u64,
    /// Disk space of each floppy disk, in bytes.
    pub floppy_space_limit: u64,
    /// Largest total size of one file upload, in bytes.
    pub upload_max_size: usize,
    pub max_upload_files: usize,
    pub terminal_width: usize,
    pub terminal_height: usize,
}

impl Default for CubicleConfig {
    fn default() -> Self {
        Self {
            max_main_global_time_ms: 10,
            max_main_computer_time_ms: 5,
            computer_space_limit: 1_000_000,
            floppy_space_limit: 125_000,
            upload_max_size: 512 * 1024,
            max_upload_files: MAX_FILES,
            terminal_width: 51,
            terminal_height: 19,
        }
    }
}

impl CubicleConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn main_thread(&self) -> MainThreadConfig {
        MainThreadConfig::from(self)
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits::from(self)
    }
}

impl From<&CubicleConfig> for MainThreadConfig {
    fn from(config: &CubicleConfig) -> Self {
        Self {
            max_global_time: Duration::from_millis(config.max_main_global_time_ms),
            max_computer_time: Duration::from_millis(config.max_main_computer_time_ms),
        }
    }
}

impl From<&CubicleConfig> for UploadLimits {
    fn from(config: &CubicleConfig) -> Self {
        Self {
            max_size: config.upload_max_size,
            max_files: config.max_upload_files.min(MAX_FILES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_agree_with_subsystems() {
        let config = CubicleConfig::default();
        assert_eq!(config.main_thread(), MainThreadConfig::default());
        assert_eq!(config.upload_limits(), UploadLimits::default());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config = CubicleConfig::from_json_str(r#"{ "computer_space_limit": 2048 }"#).unwrap();
        assert_eq!(config.computer_space_limit, 2048);
        assert_eq!(config.floppy_space_limit, 125_000);
        assert_eq!(config.max_main_computer_time_ms, 5);
    }

    #[test]
    fn upload_files_are_capped() {
        let config = CubicleConfig {
            max_upload_files: 1000,
            ..Default::default()
        };
        assert_eq!(config.upload_limits().max_files, MAX_FILES);
    }

    #[test]
    fn round_trips_through_json() {
        let config = CubicleConfig {
            max_main_global_time_ms: 50,
            terminal_width: 26,
            ..Default::default()
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(CubicleConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn bad_json_is_reported() {
        assert!(matches!(
            CubicleConfig::from_json_str(r#"{ "computer_space_limit": "lots" }"#),
            Err(ConfigError::Json(_))
        ));
    }
}
