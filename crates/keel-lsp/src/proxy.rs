//! The listening proxy: one endpoint per language on a single local port.
//!
//! Upgrade requests are routed by path before the handshake completes;
//! unknown paths are refused at the transport layer, so no process is ever
//! spawned for them. Live connections are tracked in a registry so
//! [`LspProxy::dispose`] can tear all of them down.

use std::net::SocketAddr;
use std::sync::Arc;

use keel_common::SessionTable;
use keel_config::LspConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

use crate::bridge::run_bridge;
use crate::language::Language;
use crate::resolve;
use crate::socket::{SocketLink, WsLink};
use crate::ProxyError;

// =============================================================================
// CONNECTION REGISTRY
// =============================================================================

/// Tracks the shutdown channel of every live connection.
#[derive(Clone)]
struct ConnectionRegistry {
    inner: Arc<Mutex<SessionTable<mpsc::Sender<()>>>>,
}

impl ConnectionRegistry {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionTable::new())),
        }
    }

    async fn register(&self, shutdown_tx: mpsc::Sender<()>) -> u64 {
        self.inner.lock().await.insert(shutdown_tx)
    }

    async fn deregister(&self, id: u64) {
        self.inner.lock().await.remove(id);
    }

    /// Signal every live connection to shut down. Each signal is
    /// independent: one already-closed connection cannot stop the rest.
    async fn dispose_all(&self) {
        let entries = self.inner.lock().await.drain();
        let count = entries.len();
        for (id, shutdown_tx) in entries {
            if shutdown_tx.try_send(()).is_err() {
                tracing::debug!(id, "connection already closing");
            }
        }
        tracing::info!(count, "all lsp connections signalled to close");
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

// =============================================================================
// PROXY
// =============================================================================

/// The LSP proxy server.
pub struct LspProxy {
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    connections: ConnectionRegistry,
}

impl LspProxy {
    /// Bind the listener and start accepting connections.
    pub async fn bind(config: &LspConfig) -> Result<Self, ProxyError> {
        let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;
        let local_addr = listener.local_addr()?;

        let connections = ConnectionRegistry::new();
        let accept_connections = connections.clone();
        let accept_config = config.clone();
        let accept_task = tokio::spawn(async move {
            accept_loop(listener, accept_config, accept_connections).await;
        });

        tracing::info!(addr = %local_addr, "lsp proxy listening");
        Ok(Self {
            local_addr,
            accept_task,
            connections,
        })
    }

    /// Address the proxy actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop listening, then tear down every live connection.
    pub async fn dispose(self) {
        // Aborting the accept task drops the listener and closes the port.
        self.accept_task.abort();
        self.connections.dispose_all().await;
        tracing::info!("lsp proxy disposed");
    }
}

async fn accept_loop(listener: TcpListener, config: LspConfig, connections: ConnectionRegistry) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let connections = connections.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    handle_connection(stream, addr, config, connections).await;
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "tcp accept error");
            }
        }
    }
}

/// Upgrade, resolve the server command, then bridge until closure.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    config: LspConfig,
    connections: ConnectionRegistry,
) {
    let mut language: Option<Language> = None;
    let callback = |request: &Request, response: Response| {
        let path = request.uri().path();
        match Language::from_endpoint_path(path) {
            Some(found) => {
                language = Some(found);
                Ok(response)
            }
            None => {
                tracing::warn!(peer = %addr, path = %path, "unknown language endpoint refused");
                let mut refusal = ErrorResponse::new(None);
                *refusal.status_mut() = StatusCode::NOT_FOUND;
                Err(refusal)
            }
        }
    };

    let ws = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(peer = %addr, error = %e, "ws handshake rejected");
            return;
        }
    };
    let Some(language) = language else {
        // The callback always sets it on success.
        return;
    };

    let mut link: Box<dyn SocketLink> = Box::new(WsLink::new(ws));

    // A missing server binary aborts before any spawn; the socket is
    // closed rather than left dangling.
    let command = match resolve::resolve(language, &config) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!(peer = %addr, language = %language, error = %e, "connection aborted");
            link.dispose().await;
            return;
        }
    };

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let id = connections.register(shutdown_tx).await;
    tracing::info!(id, peer = %addr, language = %language, "lsp connection accepted");

    if let Err(e) = run_bridge(link, language, command, shutdown_rx).await {
        tracing::warn!(id, language = %language, error = %e, "bridge failed");
    }

    connections.deregister(id).await;
}

// =============================================================================
// TESTS
// =============================================================================
