//! Keel configuration system.
//!
//! TOML-based configuration for the terminal transport, PTY defaults, and
//! the language-server spawn table. All sections use sensible defaults so
//! partial configs work out of the box.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{KeelConfig, LspConfig, ServerConfig, ServerSpec, TerminalConfig};

use keel_common::ConfigError;

/// Convenience function to load config from the platform default path.
///
/// Loads `config.toml` from the OS config directory, falls back to defaults
/// if none exists, and validates the result.
pub fn load_config() -> Result<KeelConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}
