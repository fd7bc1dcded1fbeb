//! Configuration module
//!
//! Handles driver settings and where they live on disk

mod settings;

pub use settings::{ConfigError, DriverSettings, DEFAULT_POLL_INTERVAL_MS};

use directories::ProjectDirs;
use std::path::PathBuf;

/// File name of the settings file inside [`config_dir`]
pub const SETTINGS_FILE: &str = "relayboard.toml";

/// Get the configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "relayboard", "Relayboard")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the settings file path
pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(SETTINGS_FILE))
}
