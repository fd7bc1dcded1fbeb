//! Driver settings

use crate::core::transport::PortConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default poll tick in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Settings file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No per-user config directory on this platform
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid settings TOML
    #[error("Invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Settings could not be rendered as TOML
    #[error("Could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    /// Port used for fields a connect request leaves unset
    pub port: PortConfig,
    /// Poll tick in milliseconds
    pub poll_interval_ms: u64,
    /// Also poll the eight GPIO channels after the relays
    pub poll_gpio: bool,
    /// Notifications buffered per subscriber before the oldest are dropped
    pub event_capacity: usize,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            port: PortConfig::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            poll_gpio: false,
            event_capacity: 64,
        }
    }
}

impl DriverSettings {
    /// Poll tick; never zero
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Load settings from the per-user config file, defaults if it does not exist
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::settings_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load settings from `path`, defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings to the per-user config file
    pub fn save(&self) -> Result<(), ConfigError> {
        let dir = super::config_dir().ok_or(ConfigError::NoConfigDir)?;
        std::fs::create_dir_all(&dir)?;
        self.save_to(&dir.join(super::SETTINGS_FILE))
    }

    /// Save settings to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = DriverSettings::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, DriverSettings::default());
        assert_eq!(settings.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relayboard.toml");
        std::fs::write(&path, "poll_gpio = true\n\n[port]\npath = \"/dev/ttyACM3\"\n").unwrap();

        let settings = DriverSettings::load_from(&path).unwrap();
        assert!(settings.poll_gpio);
        assert_eq!(settings.port.path, "/dev/ttyACM3");
        assert_eq!(settings.port.baud_rate, 0);
        assert_eq!(settings.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relayboard.toml");
        let settings = DriverSettings {
            port: PortConfig::new("COM4", 9600),
            poll_interval_ms: 25,
            ..DriverSettings::default()
        };

        settings.save_to(&path).unwrap();
        assert_eq!(DriverSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relayboard.toml");
        std::fs::write(&path, "poll_interval_ms = \"fast\"").unwrap();
        assert!(matches!(
            DriverSettings::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let settings = DriverSettings {
            poll_interval_ms: 0,
            ..DriverSettings::default()
        };
        assert_eq!(settings.poll_interval(), Duration::from_millis(1));
    }
}
