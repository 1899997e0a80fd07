//! Session event stream delivered to the registering client.

use tokio::sync::mpsc;

/// Events a live session emits to whoever created it.
///
/// Per session the stream is ordered, carries at most one `Exit`, and goes
/// silent after it. Chunks arrive in the order the process emitted them
/// with no framing guarantee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Output bytes from the process.
    Data { id: u64, chunk: Vec<u8> },
    /// The process exited on its own with the given code.
    Exit { id: u64, code: u32 },
}

/// Sender half handed to [`crate::SessionManager::create_session`].
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Receiver half the registrant drains.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Create a session event channel pair.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
