//! Core traits and I/O-free primitives.
//!
//! Nothing in this module touches a socket, so it is always compiled
//! regardless of which adapters are enabled.

mod buffer;
mod constants;
mod error;
mod queue;
mod traits;

pub use buffer::AccumulationBuffer;
pub use constants::*;
pub use error::*;
pub use queue::OutboundQueue;
pub use traits::*;
