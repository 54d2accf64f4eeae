//! Blocking transport adapter.
//!
//! Provides [`BlockingTransport`] for driving a protocol engine from one
//! dedicated thread per connection, and [`QuitHandle`] for stopping it from
//! another thread.

mod quit;
mod transport;

pub use quit::QuitHandle;
pub use transport::{BlockingTransport, LoopExit};
