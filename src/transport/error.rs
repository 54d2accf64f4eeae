//! Transport layer error types.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::core::{BufferError, QueueError};

/// Transport layer errors.
///
/// Every variant except [`TransportError::NotConnected`] ends the connection;
/// the adapters never retry internally.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The configuration handed to an adapter was rejected.
    ///
    /// Raised at construction, before any socket work.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Host name resolution failed or produced no address.
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        /// Host that was looked up.
        host: String,
        /// Port that was looked up.
        port: u16,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },

    /// Peer unreachable.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Last address tried.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// Read or write failure mid-session.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The peer shut down the stream while the session was still open.
    #[error("peer closed the stream unexpectedly")]
    UnexpectedEof,

    /// Inbound accumulation failed (overflow or engine over-consumption).
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Outbound queue misuse.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// The protocol engine reported an unrecoverable violation.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The adapter has no stream yet.
    #[error("transport is not connected")]
    NotConnected,

    /// The connection is already closed or failed.
    #[error("connection closed")]
    ConnectionClosed,
}

impl TransportError {
    /// Check if this error happened while establishing the connection.
    pub fn is_connect_error(&self) -> bool {
        matches!(
            self,
            TransportError::Resolve { .. } | TransportError::Connect { .. }
        )
    }

    /// Check if this error is fatal to the connection.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::NotConnected)
    }

    /// Check if this error was raised by the protocol engine rather than the
    /// socket.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            TransportError::Protocol(_)
                | TransportError::Buffer(BufferError::CompactOutOfRange { .. })
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
