//! TOML config file loading.

use std::path::{Path, PathBuf};

use keel_common::ConfigError;
use tracing::info;

use crate::schema::KeelConfig;

/// Load config from a specific TOML file path.
///
/// Deserializes the file using serde defaults for any missing fields.
pub fn load_from_path(path: &Path) -> Result<KeelConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config: KeelConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// On macOS: `~/Library/Application Support/keel/config.toml`
/// On Linux: `~/.config/keel/config.toml`
///
/// If the file does not exist, defaults are returned.
pub fn load_default() -> Result<KeelConfig, ConfigError> {
    let path = default_config_path()?;

    if !path.exists() {
        info!("no config found at {}, using defaults", path.display());
        return Ok(KeelConfig::default());
    }

    load_from_path(&path)
}

/// Get the platform-specific default config file path.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::ParseError("could not determine config directory".into()))?;
    Ok(config_dir.join("keel").join("config.toml"))
}
