//! Transport layer shared by both adapters.
//!
//! - **Connection lifecycle**: [`ConnectionPhase`] and [`ConnectionState`]
//! - **Configuration**: [`TransportConfig`] with explicit buffer sizing
//! - **Errors**: [`TransportError`] and [`TransportResult`]
//! - **Engine signals**: [`EngineSignals`] collected while an engine runs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           Protocol Engine               │
//! │   feed() ▲            │ ConnectionHandler
//! ├──────────┼────────────▼─────────────────┤
//! │         Transport Adapter               │  ← evented / blocking
//! │  AccumulationBuffer   OutboundQueue     │
//! ├─────────────────────────────────────────┤
//! │              TCP                        │
//! └─────────────────────────────────────────┘
//! ```

mod config;
mod connection;
mod error;
mod signals;

pub use config::{TransportConfig, TransportConfigBuilder};
pub use connection::{ConnectionPhase, ConnectionState};
pub use error::{TransportError, TransportResult};
pub use signals::EngineSignals;

pub(crate) use signals::deliver_inbound;
