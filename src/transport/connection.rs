//! Connection lifecycle shared by both adapters.

use std::fmt;

/// Connection lifecycle phase.
///
/// ```text
/// Connecting ──► Connected ──► Closing ──► Closed
///      │             │            │
///      └─────────────┴────────────┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No stream yet; outbound bytes are held.
    Connecting,
    /// Stream established, reads and writes active.
    Connected,
    /// Session closed logically; draining writes, no new outbound chunks.
    Closing,
    /// Socket closed.
    Closed,
    /// Transport or protocol failure.
    Failed,
}

impl ConnectionPhase {
    /// True once no further I/O will happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionPhase::Closed | ConnectionPhase::Failed)
    }

    /// True if new outbound chunks may be queued.
    pub fn accepts_outbound(self) -> bool {
        matches!(self, ConnectionPhase::Connecting | ConnectionPhase::Connected)
    }

    /// True if another read may be issued.
    pub fn can_read(self) -> bool {
        self == ConnectionPhase::Connected
    }

    /// True if queued chunks may be written to the socket.
    pub fn can_write(self) -> bool {
        matches!(self, ConnectionPhase::Connected | ConnectionPhase::Closing)
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Connected => "connected",
            ConnectionPhase::Closing => "closing",
            ConnectionPhase::Closed => "closed",
            ConnectionPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Phase plus session-level flags tracked by an adapter.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    phase: ConnectionPhase,
    handshake_complete: bool,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    /// Create a state in the `Connecting` phase.
    pub fn new() -> Self {
        Self {
            phase: ConnectionPhase::Connecting,
            handshake_complete: false,
        }
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Whether the engine reported a completed handshake.
    #[inline]
    pub fn is_handshake_complete(&self) -> bool {
        self.handshake_complete
    }

    /// Stream established. Returns `false` if the transition is not allowed.
    pub fn mark_connected(&mut self) -> bool {
        self.transition(ConnectionPhase::Connecting, ConnectionPhase::Connected)
    }

    /// Record the engine's handshake completion.
    pub fn complete_handshake(&mut self) {
        self.handshake_complete = true;
    }

    /// Begin a graceful close. Returns `false` if already closing or terminal.
    pub fn close(&mut self) -> bool {
        match self.phase {
            ConnectionPhase::Connecting | ConnectionPhase::Connected => {
                self.phase = ConnectionPhase::Closing;
                true
            }
            _ => false,
        }
    }

    /// Mark the socket as closed. Has no effect after a failure.
    pub fn mark_closed(&mut self) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = ConnectionPhase::Closed;
        true
    }

    /// Mark as failed. Returns `false` if already terminal.
    ///
    /// The boolean lets callers report exactly one failure per connection.
    pub fn mark_failed(&mut self) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = ConnectionPhase::Failed;
        true
    }

    fn transition(&mut self, from: ConnectionPhase, to: ConnectionPhase) -> bool {
        if self.phase != from {
            return false;
        }
        self.phase = to;
        true
    }
}
