//! Event-driven transport adapter.
//!
//! Provides [`EventedTransport`] for driving a protocol engine from one
//! cooperative tokio task per connection. Any number of connections can share
//! a current-thread runtime without locks between them.

mod event;
mod handle;
mod transport;

pub use event::{EventReceiver, TransportEvent};
pub use handle::TransportHandle;
pub use transport::EventedTransport;
