//! # stream-conduit
//!
//! Transport adapters that bridge a partially-delivered TCP byte stream to an
//! incremental, stateful protocol engine.
//!
//! A protocol engine interprets whole frames but the socket hands over
//! arbitrary-sized reads. The adapters in this crate:
//!
//! - **Accumulate** inbound bytes until the engine can consume a complete
//!   frame, retaining any unconsumed tail for the next read
//! - **Serialize** outbound chunks so writes never overlap or reorder
//! - **Sequence** connect, close and failure signaling between the socket
//!   and the engine
//!
//! Two execution models share one engine-facing interface
//! ([`ConnectionHandler`](core::ConnectionHandler)):
//!
//! - [`evented::EventedTransport`]: one cooperative tokio task per
//!   connection, never blocks
//! - [`blocking::BlockingTransport`]: one dedicated thread per connection,
//!   blocking reads and synchronous writes
//!
//! ## Feature Flags
//!
//! - `evented` (default): tokio-based adapter
//! - `blocking` (default): std-based adapter
//!
//! ## Example Engine
//!
//! ```rust
//! use stream_conduit::prelude::*;
//!
//! /// Consumes newline-terminated lines and acknowledges each one.
//! struct Lines;
//!
//! impl ProtocolEngine for Lines {
//!     fn feed(&mut self, data: &[u8], handler: &mut dyn ConnectionHandler) -> usize {
//!         let mut consumed = 0;
//!         while let Some(pos) = data[consumed..].iter().position(|&b| b == b'\n') {
//!             handler.on_outbound_ready(b"ok\n");
//!             consumed += pos + 1;
//!         }
//!         consumed
//!     }
//! }
//!
//! let mut buffer = AccumulationBuffer::new(64);
//! buffer.append(b"one\ntw").unwrap();
//! assert_eq!(buffer.available(), 6);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Shared transport types (always included)
pub mod transport;

mod error;

// Event-driven adapter (feature-gated)
#[cfg(feature = "evented")]
#[cfg_attr(docsrs, doc(cfg(feature = "evented")))]
pub mod evented;

// Blocking adapter (feature-gated)
#[cfg(feature = "blocking")]
#[cfg_attr(docsrs, doc(cfg(feature = "blocking")))]
pub mod blocking;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;
    pub use crate::error::ConduitError;
    pub use crate::transport::{
        ConnectionPhase, TransportConfig, TransportConfigBuilder, TransportError,
        TransportResult,
    };

    #[cfg(feature = "evented")]
    pub use crate::evented::{EventReceiver, EventedTransport, TransportEvent, TransportHandle};

    #[cfg(feature = "blocking")]
    pub use crate::blocking::{BlockingTransport, LoopExit, QuitHandle};
}

// Re-export commonly used items at crate root
pub use crate::core::{AccumulationBuffer, ConnectionHandler, OutboundQueue, ProtocolEngine};
pub use crate::error::ConduitError;
pub use crate::transport::{ConnectionPhase, TransportConfig, TransportError, TransportResult};

#[cfg(feature = "evented")]
pub use crate::evented::{EventedTransport, TransportEvent, TransportHandle};

#[cfg(feature = "blocking")]
pub use crate::blocking::{BlockingTransport, LoopExit};
