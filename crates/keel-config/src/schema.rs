//! Configuration schema types for keel.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with sensible defaults.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// Server Config
// =============================================================================

/// Terminal transport listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the terminal WebSocket listener on.
    pub bind: String,
    /// Port for the terminal surface (`/terminal` endpoint).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 4050,
        }
    }
}

// =============================================================================
// Terminal Config
// =============================================================================

/// PTY session defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Shell binary to use when a create request carries none.
    /// Empty string means "detect the platform default".
    pub default_shell: String,
    /// Default terminal columns (valid range: 2-500).
    pub cols: u16,
    /// Default terminal rows (valid range: 2-500).
    pub rows: u16,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            default_shell: String::new(),
            cols: 80,
            rows: 30,
        }
    }
}

// =============================================================================
// LSP Config
// =============================================================================

/// One language server launch command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSpec {
    /// Program name (resolved against PATH) or an absolute path.
    pub command: String,
    /// Argument vector passed verbatim.
    pub args: Vec<String>,
}

impl Default for ServerSpec {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
        }
    }
}

/// LSP proxy listener and spawn-table overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LspConfig {
    /// Address to bind the LSP proxy listener on.
    pub bind: String,
    /// Port the language endpoints (`/python`, `/typescript`, ...) live on.
    pub port: u16,
    /// Per-language command overrides, keyed by language name
    /// (`python`, `typescript`, `html`, `css`, `json`).
    pub servers: HashMap<String, ServerSpec>,
}

impl Default for LspConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 4000,
            servers: HashMap::new(),
        }
    }
}

// =============================================================================
// Root Config
// =============================================================================

/// Root configuration object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeelConfig {
    pub server: ServerConfig,
    pub terminal: TerminalConfig,
    pub lsp: LspConfig,
}
