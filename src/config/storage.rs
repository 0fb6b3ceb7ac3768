//! Configuration Storage
//!
//! Reads `config.toml` in the platform configuration directory
//! (for example `~/.config/guild-store/config.toml` on Linux).

use crate::config::Settings;
use crate::error::{Result, StoreError};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

/// Get the configuration directory path, creating it if needed
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| StoreError::Config("could not find configuration directory".to_string()))?
        .join("guild-store");

    fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}

/// Get the configuration file path
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Load settings from the default location. A missing file yields defaults.
pub fn load() -> Result<Settings> {
    load_from(&config_file()?)
}

/// Load settings from a specific file
pub fn load_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = fs::read_to_string(path)?;
    Settings::from_toml(&content)
}
