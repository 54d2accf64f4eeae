//! Outbound chunk queue with a single-writer drain discipline.
//!
//! The queue never performs I/O. The adapter owning it asks for the next
//! chunk with [`OutboundQueue::begin_write`], transmits it, and reports back
//! with [`OutboundQueue::finish_write`]. Between those two calls the head
//! chunk is "in flight" and no other chunk is handed out.

use std::collections::VecDeque;

use bytes::Bytes;

use super::error::QueueError;

/// FIFO of pending outbound chunks.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    chunks: VecDeque<Bytes>,
    write_in_flight: bool,
}

impl OutboundQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a copy of `bytes` to the tail.
    ///
    /// Does not start a transmission.
    pub fn enqueue(&mut self, bytes: &[u8]) {
        self.chunks.push_back(Bytes::copy_from_slice(bytes));
    }

    /// Append an owned chunk to the tail without copying.
    pub fn enqueue_bytes(&mut self, chunk: Bytes) {
        self.chunks.push_back(chunk);
    }

    /// The head chunk, if any.
    pub fn front(&self) -> Option<&Bytes> {
        self.chunks.front()
    }

    /// Remove the head chunk.
    pub fn pop_front(&mut self) -> Result<Bytes, QueueError> {
        self.chunks.pop_front().ok_or(QueueError::EmptyQueue)
    }

    /// True when nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of queued chunks, including one in flight.
    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Total bytes queued, including one in flight.
    pub fn pending_bytes(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// True while the head chunk is being transmitted.
    #[inline]
    pub fn is_write_in_flight(&self) -> bool {
        self.write_in_flight
    }

    /// Hand out the head chunk for transmission.
    ///
    /// Returns `None` if a write is already in flight or the queue is empty.
    /// The returned handle shares storage with the queued chunk; the chunk
    /// stays queued until [`finish_write`](Self::finish_write).
    pub fn begin_write(&mut self) -> Option<Bytes> {
        if self.write_in_flight {
            return None;
        }
        let chunk = self.chunks.front()?.clone();
        self.write_in_flight = true;
        Some(chunk)
    }

    /// Record that the in-flight chunk was fully transmitted.
    ///
    /// Pops it and returns the next chunk to transmit, keeping the in-flight
    /// flag set, or clears the flag when nothing is left.
    pub fn finish_write(&mut self) -> Result<Option<Bytes>, QueueError> {
        if !self.write_in_flight {
            return Err(QueueError::EmptyQueue);
        }
        self.pop_front()?;

        match self.chunks.front() {
            Some(next) => Ok(Some(next.clone())),
            None => {
                self.write_in_flight = false;
                Ok(None)
            }
        }
    }

    /// Drop every queued chunk and clear the in-flight flag.
    ///
    /// Returns how many chunks were discarded.
    pub fn abandon(&mut self) -> usize {
        let dropped = self.chunks.len();
        self.chunks.clear();
        self.write_in_flight = false;
        dropped
    }
}
