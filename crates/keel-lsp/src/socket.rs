//! Minimal socket abstraction for the client side of a bridge.
//!
//! [`SocketLink`] is the narrow waist the bridge talks through: send a
//! message, await the next inbound event, dispose. Any transport fits;
//! the proxy wraps WebSockets in [`WsLink`]; [`ChannelLink`] is the
//! in-process channel variant used when both endpoints live in the same
//! process.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::ProxyError;

/// What a link reports back: a message, a transport error, or closure.
/// After `Closed` or `Error` no further events are meaningful.
#[derive(Debug)]
pub enum LinkEvent {
    Message(String),
    Error(String),
    Closed,
}

/// The bridge-facing surface of one client connection.
#[async_trait]
pub trait SocketLink: Send {
    /// Send one message to the client.
    async fn send(&mut self, body: String) -> Result<(), ProxyError>;

    /// Await the next inbound event.
    async fn next_event(&mut self) -> LinkEvent;

    /// Close the link. Idempotent.
    async fn dispose(&mut self);
}

// =============================================================================
// WEBSOCKET LINK
// =============================================================================

/// A [`SocketLink`] over a server-side WebSocket stream.
pub struct WsLink<S> {
    inner: WebSocketStream<S>,
}

impl<S> WsLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(ws: WebSocketStream<S>) -> Self {
        Self { inner: ws }
    }
}

#[async_trait]
impl<S> SocketLink for WsLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, body: String) -> Result<(), ProxyError> {
        self.inner
            .send(Message::Text(body.into()))
            .await
            .map_err(|e| ProxyError::Socket(e.to_string()))
    }

    async fn next_event(&mut self) -> LinkEvent {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return LinkEvent::Message(text.to_string()),
                Some(Ok(Message::Binary(data))) => {
                    return LinkEvent::Message(String::from_utf8_lossy(&data).into_owned())
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = self.inner.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => return LinkEvent::Closed,
                Some(Err(e)) => return LinkEvent::Error(e.to_string()),
                Some(Ok(_)) => {}
            }
        }
    }

    async fn dispose(&mut self) {
        let _ = self.inner.close(None).await;
    }
}

// =============================================================================
// CHANNEL LINK
// =============================================================================

/// An in-process [`SocketLink`] made of two unbounded channels.
pub struct ChannelLink {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl ChannelLink {
    /// Create a connected pair of links. What one side sends, the other
    /// receives.
    pub fn pair() -> (ChannelLink, ChannelLink) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            ChannelLink {
                tx: Some(a_tx),
                rx: b_rx,
            },
            ChannelLink {
                tx: Some(b_tx),
                rx: a_rx,
            },
        )
    }
}

#[async_trait]
impl SocketLink for ChannelLink {
    async fn send(&mut self, body: String) -> Result<(), ProxyError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| ProxyError::Socket("link disposed".into()))?;
        tx.send(body)
            .map_err(|_| ProxyError::Socket("peer closed".into()))
    }

    async fn next_event(&mut self) -> LinkEvent {
        match self.rx.recv().await {
            Some(body) => LinkEvent::Message(body),
            None => LinkEvent::Closed,
        }
    }

    async fn dispose(&mut self) {
        // Dropping our sender makes the peer's receiver run dry → Closed.
        self.tx = None;
    }
}
