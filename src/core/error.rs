//! Error types for the buffer and queue primitives.

use thiserror::Error;

/// Errors raised by [`AccumulationBuffer`](crate::core::AccumulationBuffer).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The append does not fit in the remaining capacity.
    ///
    /// Nothing is written when this is returned.
    #[error("accumulation buffer capacity exceeded: {requested} bytes requested, {remaining} free")]
    CapacityExceeded {
        /// Bytes the caller tried to append.
        requested: usize,
        /// Free bytes left in the buffer.
        remaining: usize,
    },

    /// Compaction asked to drop more bytes than are buffered.
    #[error("cannot compact {requested} bytes, only {used} buffered")]
    CompactOutOfRange {
        /// Bytes the caller tried to drop.
        requested: usize,
        /// Bytes currently buffered.
        used: usize,
    },
}

/// Errors raised by [`OutboundQueue`](crate::core::OutboundQueue).
///
/// These indicate misuse of the queue rather than a runtime fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Pop attempted on an empty queue.
    #[error("outbound queue is empty")]
    EmptyQueue,
}
