//! LSP proxy: bridges WebSocket clients to language-server child processes.
//!
//! Each inbound connection selects a language by its endpoint path, spawns
//! the configured language server, and forwards JSON-RPC messages verbatim
//! in both directions until either side closes.

pub mod bridge;
pub mod framing;
pub mod language;
pub mod proxy;
pub mod resolve;
pub mod socket;

pub use language::Language;
pub use proxy::LspProxy;
pub use resolve::ServerCommand;
pub use socket::{ChannelLink, LinkEvent, SocketLink, WsLink};

/// Errors originating from the LSP proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("language server for {language} not found: {command}")]
    ServerNotFound {
        language: &'static str,
        command: String,
    },

    #[error("failed to spawn language server: {0}")]
    Spawn(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("socket error: {0}")]
    Socket(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
