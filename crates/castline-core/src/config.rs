//! Controller configuration, loaded from JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event_bus::DEFAULT_CAPACITY;
use crate::session::MAX_VOLUME;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tunables for a [`SessionController`](crate::session::SessionController).
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    /// Upper bound on a connect attempt.
    pub connect_timeout_ms: u64,

    /// Upper bound on a teardown call before the local reset is applied anyway.
    pub teardown_timeout_ms: u64,

    /// Upper bound on a playback-control call.
    pub control_timeout_ms: u64,

    pub event_capacity: usize,

    pub initial_volume: u8,

    /// Directory for the transport transcript. No transcript when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            teardown_timeout_ms: 5_000,
            control_timeout_ms: 5_000,
            event_capacity: DEFAULT_CAPACITY,
            initial_volume: MAX_VOLUME,
            log_dir: None,
        }
    }
}

impl ControllerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    /// Load a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.teardown_timeout(), Duration::from_secs(5));
        assert_eq!(config.control_timeout(), Duration::from_secs(5));
        assert_eq!(config.event_capacity, 1024);
        assert_eq!(config.initial_volume, 100);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = ControllerConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn load_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"connectTimeoutMs": 250, "initialVolume": 60}"#).unwrap();

        let config = ControllerConfig::load(&path).unwrap();
        assert_eq!(config.connect_timeout(), Duration::from_millis(250));
        assert_eq!(config.initial_volume, 60);
        assert_eq!(config.teardown_timeout_ms, 5_000);
    }

    #[test]
    fn load_invalid_json_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let error = ControllerConfig::load(&path).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
        assert!(error.to_string().contains("config.json"));
    }

    #[test]
    fn serializes_camel_case_without_log_dir() {
        let value = serde_json::to_value(ControllerConfig::default()).unwrap();
        assert_eq!(value["connectTimeoutMs"], 10_000);
        assert!(value.get("logDir").is_none());
    }
}
