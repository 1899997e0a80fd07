//! Terminal WebSocket listener.
//!
//! Serves the `/terminal` endpoint; any other upgrade path is refused
//! before the handshake completes.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

use keel_config::KeelConfig;
use keel_term::SessionManager;

use crate::connection::{handle_connection, SharedManager};

/// The terminal server: accept loop plus the shared session manager.
pub struct TerminalServer {
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    manager: SharedManager,
}

impl TerminalServer {
    /// Bind the listener and start accepting terminal clients.
    pub async fn bind(config: &KeelConfig) -> std::io::Result<Self> {
        let listener =
            TcpListener::bind((config.server.bind.as_str(), config.server.port)).await?;
        let local_addr = listener.local_addr()?;

        let manager: SharedManager = Arc::new(Mutex::new(SessionManager::new()));
        let accept_manager = manager.clone();
        let terminal = config.terminal.clone();
        let accept_task = tokio::spawn(async move {
            accept_loop(listener, accept_manager, terminal).await;
        });

        tracing::info!(addr = %local_addr, "terminal server listening");
        Ok(Self {
            local_addr,
            accept_task,
            manager,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and kill every live session.
    pub async fn shutdown(self) {
        self.accept_task.abort();
        self.manager.lock().await.kill_all();
        tracing::info!("terminal server shut down");
    }
}

async fn accept_loop(
    listener: TcpListener,
    manager: SharedManager,
    terminal: keel_config::TerminalConfig,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let manager = manager.clone();
                let terminal = terminal.clone();
                tokio::spawn(async move {
                    match upgrade(stream, addr).await {
                        Some(ws) => handle_connection(ws, addr, manager, terminal).await,
                        None => {}
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "tcp accept error");
            }
        }
    }
}

/// Complete the WebSocket handshake, refusing any path but `/terminal`.
async fn upgrade(
    stream: TcpStream,
    addr: SocketAddr,
) -> Option<tokio_tungstenite::WebSocketStream<TcpStream>> {
    let callback = |request: &Request, response: Response| {
        let path = request.uri().path();
        if path == "/terminal" {
            Ok(response)
        } else {
            tracing::warn!(peer = %addr, path = %path, "unknown endpoint refused");
            let mut refusal = ErrorResponse::new(None);
            *refusal.status_mut() = StatusCode::NOT_FOUND;
            Err(refusal)
        }
    };
    match accept_hdr_async(stream, callback).await {
        Ok(ws) => Some(ws),
        Err(e) => {
            tracing::debug!(peer = %addr, error = %e, "ws handshake rejected");
            None
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ServerMessage;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::Value;
    use std::time::Duration;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    fn test_config() -> KeelConfig {
        let mut config = KeelConfig::default();
        config.server.port = 0;
        config
    }

    async fn recv_json(
        ws: &mut tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<TcpStream>,
        >,
    ) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .expect("ws error");
        match frame {
            Message::Text(text) => serde_json::from_str(&text).expect("invalid json frame"),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    /// Skip interleaved output frames until a message of the wanted type
    /// arrives.
    async fn recv_typed(
        ws: &mut tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<TcpStream>,
        >,
        wanted: &str,
    ) -> Value {
        loop {
            let msg = recv_json(ws).await;
            if msg["type"] == wanted {
                return msg;
            }
            assert_eq!(msg["type"], "data", "unexpected message: {msg}");
        }
    }

    #[tokio::test]
    async fn non_terminal_path_is_refused() {
        let server = TerminalServer::bind(&test_config()).await.unwrap();
        let url = format!("ws://{}/shell", server.local_addr());
        assert!(connect_async(&url).await.is_err());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn get_shells_lists_at_least_one_shell() {
        let server = TerminalServer::bind(&test_config()).await.unwrap();
        let url = format!("ws://{}/terminal", server.local_addr());
        let (mut ws, _) = connect_async(&url).await.unwrap();

        ws.send(Message::Text(r#"{"type":"get_shells"}"#.into()))
            .await
            .unwrap();
        let msg = recv_typed(&mut ws, "shells").await;
        assert!(!msg["shells"].as_array().unwrap().is_empty());

        server.shutdown().await;
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn session_lifecycle_over_the_wire() {
        let server = TerminalServer::bind(&test_config()).await.unwrap();
        let url = format!("ws://{}/terminal", server.local_addr());
        let (mut ws, _) = connect_async(&url).await.unwrap();

        // Create a session running a plain shell.
        ws.send(Message::Text(
            r#"{"type":"create","shell":"/bin/sh","cols":80,"rows":24}"#.into(),
        ))
        .await
        .unwrap();
        let created = recv_typed(&mut ws, "created").await;
        let id = created["id"].as_u64().unwrap();

        // Input comes back out through the pty.
        let write = serde_json::json!({
            "type": "write",
            "id": id,
            "data": "echo liveness_marker\r",
        });
        ws.send(Message::Text(write.to_string().into())).await.unwrap();

        let mut output = String::new();
        tokio::time::timeout(Duration::from_secs(10), async {
            while !output.contains("liveness_marker") {
                let msg = recv_typed(&mut ws, "data").await;
                assert_eq!(msg["id"].as_u64().unwrap(), id);
                output.push_str(msg["data"].as_str().unwrap());
            }
        })
        .await
        .expect("no echo from the session");

        // The session is listed, then disappears after kill with no exit
        // notification.
        ws.send(Message::Text(r#"{"type":"get_all"}"#.into()))
            .await
            .unwrap();
        let msg = recv_typed(&mut ws, "session_ids").await;
        assert_eq!(msg["ids"], serde_json::json!([id]));

        let kill = serde_json::json!({ "type": "kill", "id": id });
        ws.send(Message::Text(kill.to_string().into())).await.unwrap();
        ws.send(Message::Text(r#"{"type":"get_all"}"#.into()))
            .await
            .unwrap();
        let msg = recv_typed(&mut ws, "session_ids").await;
        assert_eq!(msg["ids"], serde_json::json!([]));

        server.shutdown().await;
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn natural_exit_is_reported_once() {
        let server = TerminalServer::bind(&test_config()).await.unwrap();
        let url = format!("ws://{}/terminal", server.local_addr());
        let (mut ws, _) = connect_async(&url).await.unwrap();

        ws.send(Message::Text(
            r#"{"type":"create","shell":"/bin/sh"}"#.into(),
        ))
        .await
        .unwrap();
        let created = recv_typed(&mut ws, "created").await;
        let id = created["id"].as_u64().unwrap();

        let write = serde_json::json!({ "type": "write", "id": id, "data": "exit 3\r" });
        ws.send(Message::Text(write.to_string().into())).await.unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(10), recv_typed(&mut ws, "exit"))
            .await
            .expect("no exit notification");
        assert_eq!(exit["id"].as_u64().unwrap(), id);
        assert_eq!(exit["code"].as_u64().unwrap(), 3);

        // The table no longer lists the exited session.
        ws.send(Message::Text(r#"{"type":"get_all"}"#.into()))
            .await
            .unwrap();
        let msg = recv_typed(&mut ws, "session_ids").await;
        assert_eq!(msg["ids"], serde_json::json!([]));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn create_failure_is_reported_not_fatal() {
        let server = TerminalServer::bind(&test_config()).await.unwrap();
        let url = format!("ws://{}/terminal", server.local_addr());
        let (mut ws, _) = connect_async(&url).await.unwrap();

        ws.send(Message::Text(
            r#"{"type":"create","shell":"/definitely/not/a/shell"}"#.into(),
        ))
        .await
        .unwrap();
        let msg = recv_typed(&mut ws, "create_failed").await;
        assert!(msg["error"].as_str().unwrap().contains("/definitely/not/a/shell"));

        // The connection survives a failed create.
        ws.send(Message::Text(r#"{"type":"get_all"}"#.into()))
            .await
            .unwrap();
        let msg = recv_typed(&mut ws, "session_ids").await;
        assert_eq!(msg["ids"], serde_json::json!([]));

        server.shutdown().await;
    }

    #[test]
    fn server_message_exit_shape_is_stable() {
        let json = serde_json::to_string(&ServerMessage::Exit { id: 1, code: 0 }).unwrap();
        assert!(json.contains(r#""type":"exit""#));
    }
}
