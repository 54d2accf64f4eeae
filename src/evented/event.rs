//! Connection events reported to the owner of an evented transport.

use tokio::sync::mpsc;

/// Lifecycle event emitted by [`EventedTransport`](super::EventedTransport).
///
/// Each connection ends with exactly one terminal event: [`Closed`],
/// [`Failed`] or [`ProtocolError`]. A failed `connect` is returned to the
/// caller directly and emits nothing.
///
/// [`Closed`]: TransportEvent::Closed
/// [`Failed`]: TransportEvent::Failed
/// [`ProtocolError`]: TransportEvent::ProtocolError
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Stream established.
    Connected,
    /// The engine reported the session usable.
    HandshakeComplete,
    /// The engine reported an unrecoverable protocol violation.
    ProtocolError(String),
    /// Socket closed after a graceful close.
    Closed,
    /// Transport failure; queued output was abandoned.
    Failed(String),
}

impl TransportEvent {
    /// True for the event that ends a connection.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransportEvent::ProtocolError(_) | TransportEvent::Closed | TransportEvent::Failed(_)
        )
    }
}

/// Receiving side of a transport's event stream.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl EventReceiver {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<TransportEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Receive the next event.
    ///
    /// Returns `None` once the transport is gone and every event was read.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }

    /// Receive an event if one is already queued.
    pub fn try_recv(&mut self) -> Option<TransportEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait for the terminal event, skipping everything before it.
    pub async fn terminal(&mut self) -> Option<TransportEvent> {
        while let Some(event) = self.rx.recv().await {
            if event.is_terminal() {
                return Some(event);
            }
        }
        None
    }
}
