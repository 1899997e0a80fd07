//! Per-client handler: requests in, session events out.
//!
//! Each client owns the sessions it created. Session output and exit
//! notifications are routed only to the creating client, and when a client
//! disconnects every session it still owns is killed.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use keel_config::TerminalConfig;
use keel_term::{available_shells, event, CreateSessionOptions, SessionEvent, SessionManager};

use crate::protocol::{ClientRequest, ServerMessage};

/// Session manager shared by every client connection. Ids stay unique
/// across clients because the table is global.
pub type SharedManager = Arc<Mutex<SessionManager>>;

type Sink = futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>;

/// Handle a single terminal client from handshake to cleanup.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    manager: SharedManager,
    terminal: TerminalConfig,
) {
    let (mut sink, mut stream) = ws.split();
    let (events_tx, mut events_rx) = event::channel();
    let mut owned: HashSet<u64> = HashSet::new();

    tracing::info!(peer = %addr, "terminal client connected");

    loop {
        tokio::select! {
            // Session events for this client's sessions.
            Some(ev) = events_rx.recv() => {
                let msg = match ev {
                    SessionEvent::Data { id, chunk } => ServerMessage::Data {
                        id,
                        data: String::from_utf8_lossy(&chunk).into_owned(),
                    },
                    SessionEvent::Exit { id, code } => {
                        manager.lock().await.remove_exited(id);
                        owned.remove(&id);
                        ServerMessage::Exit { id, code }
                    }
                };
                if send_message(&mut sink, &msg).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let request = match serde_json::from_str::<ClientRequest>(&text) {
                            Ok(request) => request,
                            Err(e) => {
                                tracing::warn!(peer = %addr, error = %e, "invalid request ignored");
                                continue;
                            }
                        };
                        if handle_request(
                            request,
                            &mut sink,
                            &manager,
                            &terminal,
                            &events_tx,
                            &mut owned,
                        )
                        .await
                        .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "ws error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // Sessions do not outlive the client that created them.
    let mut manager = manager.lock().await;
    for id in owned.drain() {
        manager.kill(id);
    }
    tracing::info!(peer = %addr, "terminal client disconnected");
}

/// Dispatch one request. An `Err` means the socket is gone.
async fn handle_request(
    request: ClientRequest,
    sink: &mut Sink,
    manager: &SharedManager,
    terminal: &TerminalConfig,
    events_tx: &event::EventSender,
    owned: &mut HashSet<u64>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    match request {
        ClientRequest::GetShells => {
            send_message(
                sink,
                &ServerMessage::Shells {
                    shells: available_shells(),
                },
            )
            .await?;
        }

        ClientRequest::Create {
            shell,
            cwd,
            cols,
            rows,
            args,
            env,
        } => {
            let opts = CreateSessionOptions {
                shell: shell.or_else(|| {
                    (!terminal.default_shell.is_empty()).then(|| terminal.default_shell.clone())
                }),
                cwd: cwd.map(PathBuf::from),
                cols: cols.filter(|c| *c > 0).or(Some(terminal.cols)),
                rows: rows.filter(|r| *r > 0).or(Some(terminal.rows)),
                args,
                env: env.into_iter().collect(),
            };
            let result = manager.lock().await.create_session(opts, events_tx.clone());
            match result {
                Ok(id) => {
                    owned.insert(id);
                    send_message(sink, &ServerMessage::Created { id }).await?;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "session create failed");
                    send_message(
                        sink,
                        &ServerMessage::CreateFailed {
                            error: e.to_string(),
                        },
                    )
                    .await?;
                }
            }
        }

        ClientRequest::Write { id, data } => {
            if owned.contains(&id) {
                manager.lock().await.write(id, data.as_bytes());
            } else {
                tracing::debug!(id, "write to unowned session ignored");
            }
        }

        ClientRequest::Resize { id, cols, rows } => {
            if owned.contains(&id) {
                manager.lock().await.resize(id, cols, rows);
            }
        }

        ClientRequest::Kill { id } => {
            if owned.remove(&id) {
                manager.lock().await.kill(id);
            }
        }

        ClientRequest::GetAll => {
            let mut ids: Vec<u64> = owned.iter().copied().collect();
            ids.sort_unstable();
            send_message(sink, &ServerMessage::SessionIds { ids }).await?;
        }
    }
    Ok(())
}

/// Send a ServerMessage as a JSON text frame.
async fn send_message(
    sink: &mut Sink,
    message: &ServerMessage,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let json = serde_json::to_string(message).unwrap();
    sink.send(Message::Text(json.into())).await
}
