//! The forwarding link between one client socket and one language server.
//!
//! `CONNECTING` ends when the child is spawned; the loop below is the
//! `BRIDGING` state; any exit from the loop enters `CLOSED`, where the
//! process and the link are released exactly once. The process never
//! outlives the socket and vice versa: socket closure kills the child,
//! child exit disposes the socket.

use std::process::Stdio;

use tokio::io::BufReader;
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::framing;
use crate::language::Language;
use crate::resolve::ServerCommand;
use crate::socket::{LinkEvent, SocketLink};
use crate::ProxyError;

/// Spawn the language server and forward messages until either side closes
/// or a shutdown signal arrives. Consumes the link; on return both
/// endpoints are released.
pub async fn run_bridge(
    mut link: Box<dyn SocketLink>,
    language: Language,
    command: ServerCommand,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<(), ProxyError> {
    let mut child = match Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            // Spawn failed: close the socket rather than leaving it dangling.
            link.dispose().await;
            return Err(ProxyError::Spawn(format!(
                "{}: {e}",
                command.program.display()
            )));
        }
    };

    let mut stdin = match child.stdin.take() {
        Some(stdin) => stdin,
        None => {
            link.dispose().await;
            return Err(ProxyError::Spawn("child stdin unavailable".into()));
        }
    };
    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            link.dispose().await;
            return Err(ProxyError::Spawn("child stdout unavailable".into()));
        }
    };

    tracing::info!(language = %language, server = %command.program.display(), "language server bridged");

    // Server→client frames are read on their own task: a frame read must
    // never be cancelled halfway by the select below.
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Result<Option<String>, ProxyError>>();
    let reader_task = tokio::spawn(async move {
        let mut stdout = BufReader::new(stdout);
        loop {
            let frame = framing::read_message(&mut stdout).await;
            let done = !matches!(frame, Ok(Some(_)));
            if frame_tx.send(frame).is_err() || done {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            event = link.next_event() => match event {
                LinkEvent::Message(body) => {
                    if let Some(method) = request_method(&body) {
                        tracing::debug!(language = %language, method = %method, "client request");
                    }
                    if let Err(e) = framing::write_message(&mut stdin, &body).await {
                        tracing::debug!(language = %language, error = %e, "write to language server failed");
                        break;
                    }
                }
                LinkEvent::Error(e) => {
                    tracing::warn!(language = %language, error = %e, "socket error");
                    break;
                }
                LinkEvent::Closed => {
                    tracing::debug!(language = %language, "socket closed");
                    break;
                }
            },

            frame = frame_rx.recv() => match frame {
                Some(Ok(Some(body))) => {
                    if link.send(body).await.is_err() {
                        break;
                    }
                }
                Some(Ok(None)) | None => {
                    tracing::debug!(language = %language, "language server closed its stdout");
                    break;
                }
                Some(Err(e)) => {
                    tracing::debug!(language = %language, error = %e, "language server framing error");
                    break;
                }
            },

            _ = shutdown_rx.recv() => {
                tracing::debug!(language = %language, "bridge shutdown requested");
                break;
            }
        }
    }

    // CLOSED: release both endpoints.
    reader_task.abort();
    if let Err(e) = child.start_kill() {
        tracing::debug!(language = %language, "language server kill error (may have exited): {e}");
    }
    link.dispose().await;
    tracing::info!(language = %language, "language server connection closed");
    Ok(())
}

/// Inspection hook: pull the method name out of an outbound JSON-RPC
/// request. Observational only; the forwarded body is always the
/// original text.
fn request_method(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if value.get("id").is_none() {
        return None;
    }
    value
        .get("method")
        .and_then(|m| m.as_str())
        .map(|m| m.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::ChannelLink;
    use std::path::PathBuf;
    use std::time::Duration;

    fn cat_command() -> ServerCommand {
        ServerCommand {
            program: PathBuf::from("/bin/cat"),
            args: vec![],
        }
    }

    #[test]
    fn request_method_extracts_requests_only() {
        let req = r#"{"jsonrpc":"2.0","id":4,"method":"textDocument/hover","params":{}}"#;
        assert_eq!(request_method(req).as_deref(), Some("textDocument/hover"));

        // Notifications have no id and are not reported.
        let notif = r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#;
        assert_eq!(request_method(notif), None);

        assert_eq!(request_method("not json"), None);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn bridge_round_trips_messages_verbatim() {
        // `cat` echoes the framed stream back, so every body the client
        // sends must come back byte-for-byte.
        let (mut client, server_side) = ChannelLink::pair();
        let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let bridge = tokio::spawn(run_bridge(
            Box::new(server_side),
            Language::Json,
            cat_command(),
            shutdown_rx,
        ));

        let bodies = [
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"rootUri":null}}"#,
            r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"shutdown"}"#,
        ];

        for body in bodies {
            client.send(body.to_string()).await.unwrap();
            let event = tokio::time::timeout(Duration::from_secs(5), client.next_event())
                .await
                .expect("timed out waiting for echo");
            match event {
                LinkEvent::Message(echoed) => assert_eq!(echoed, body),
                other => panic!("expected echoed message, got {other:?}"),
            }
        }

        // Client closes → bridge kills the child and finishes.
        client.dispose().await;
        tokio::time::timeout(Duration::from_secs(5), bridge)
            .await
            .expect("bridge did not finish")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn shutdown_signal_closes_the_client() {
        let (mut client, server_side) = ChannelLink::pair();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let bridge = tokio::spawn(run_bridge(
            Box::new(server_side),
            Language::Css,
            cat_command(),
            shutdown_rx,
        ));

        shutdown_tx.send(()).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), client.next_event())
            .await
            .expect("timed out waiting for close");
        assert!(matches!(event, LinkEvent::Closed));

        bridge.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn spawn_failure_disposes_the_link_and_errors() {
        let (mut client, server_side) = ChannelLink::pair();
        let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let result = run_bridge(
            Box::new(server_side),
            Language::Python,
            ServerCommand {
                program: PathBuf::from("/definitely/not/a/server"),
                args: vec![],
            },
            shutdown_rx,
        )
        .await;

        assert!(matches!(result, Err(ProxyError::Spawn(_))));
        assert!(matches!(client.next_event().await, LinkEvent::Closed));
    }
}
