//! Accumulation buffer for partially consumed inbound bytes.
//!
//! Socket reads land here until the protocol engine can interpret a whole
//! frame. Whatever the engine leaves unconsumed is shifted to the front and
//! joined with the next read.

use super::error::BufferError;

/// Fixed-capacity byte store with shift-based compaction.
///
/// Bytes `[0, used)` are valid and contiguous; everything past `used` is
/// scratch. Compaction is O(unconsumed length), which stays small because
/// the residue is at most one partial frame.
#[derive(Debug)]
pub struct AccumulationBuffer {
    storage: Box<[u8]>,
    used: usize,
}

impl AccumulationBuffer {
    /// Create an empty buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
        }
    }

    /// Append `bytes` after the buffered data.
    ///
    /// Either all of `bytes` is stored or nothing is.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        let remaining = self.remaining();
        if bytes.len() > remaining {
            return Err(BufferError::CapacityExceeded {
                requested: bytes.len(),
                remaining,
            });
        }

        let end = self.used + bytes.len();
        self.storage[self.used..end].copy_from_slice(bytes);
        self.used = end;
        Ok(())
    }

    /// Number of valid bytes.
    #[inline]
    pub fn available(&self) -> usize {
        self.used
    }

    /// Read-only view of the valid bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.storage[..self.used]
    }

    /// Drop the first `n` bytes, moving the rest to offset 0.
    pub fn compact(&mut self, n: usize) -> Result<(), BufferError> {
        if n > self.used {
            return Err(BufferError::CompactOutOfRange {
                requested: n,
                used: self.used,
            });
        }

        if n == 0 {
            return Ok(());
        }

        if n == self.used {
            self.drain();
            return Ok(());
        }

        self.storage.copy_within(n..self.used, 0);
        self.used -= n;
        Ok(())
    }

    /// Discard everything.
    #[inline]
    pub fn drain(&mut self) {
        self.used = 0;
    }

    /// Maximum number of bytes the buffer can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Free room left for appends.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.storage.len() - self.used
    }

    /// True when no bytes are buffered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_append_and_view() {
        let mut buffer = AccumulationBuffer::new(16);
        buffer.append(b"AB").unwrap();
        buffer.append(b"CDE").unwrap();

        assert_eq!(buffer.available(), 5);
        assert_eq!(buffer.data(), b"ABCDE");
        assert_eq!(buffer.remaining(), 11);
    }

    #[test]
    fn test_append_is_all_or_nothing() {
        let mut buffer = AccumulationBuffer::new(4);
        buffer.append(b"abc").unwrap();

        let err = buffer.append(b"de").unwrap_err();
        assert_eq!(
            err,
            BufferError::CapacityExceeded {
                requested: 2,
                remaining: 1
            }
        );
        // Nothing from the failed append was kept
        assert_eq!(buffer.data(), b"abc");

        buffer.append(b"d").unwrap();
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn test_compact_partial() {
        let mut buffer = AccumulationBuffer::new(8);
        buffer.append(b"AB").unwrap();

        // Engine consumed "A"; "B" must survive for the next read
        buffer.compact(1).unwrap();
        assert_eq!(buffer.data(), b"B");

        buffer.append(b"CDE").unwrap();
        assert_eq!(buffer.data(), b"BCDE");

        buffer.compact(4).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_compact_zero_is_noop() {
        let mut buffer = AccumulationBuffer::new(8);
        buffer.append(b"xyz").unwrap();
        buffer.compact(0).unwrap();
        assert_eq!(buffer.data(), b"xyz");

        let mut empty = AccumulationBuffer::new(8);
        empty.compact(0).unwrap();
        assert_eq!(empty.available(), 0);
    }

    #[test]
    fn test_compact_out_of_range() {
        let mut buffer = AccumulationBuffer::new(8);
        buffer.append(b"xy").unwrap();

        let err = buffer.compact(3).unwrap_err();
        assert_eq!(err, BufferError::CompactOutOfRange { requested: 3, used: 2 });
        assert_eq!(buffer.data(), b"xy");
    }

    #[test]
    fn test_zero_capacity() {
        let mut buffer = AccumulationBuffer::new(0);
        buffer.append(b"").unwrap();
        assert!(buffer.append(b"x").is_err());
        assert_eq!(buffer.capacity(), 0);
    }

    proptest! {
        #[test]
        fn prop_append_concatenates(chunks in proptest::collection::vec(
            proptest::collection::vec(any::<u8>(), 0..32), 0..16)
        ) {
            let total: usize = chunks.iter().map(Vec::len).sum();
            let mut buffer = AccumulationBuffer::new(total);
            let mut expected = Vec::new();

            for chunk in &chunks {
                buffer.append(chunk).unwrap();
                expected.extend_from_slice(chunk);
            }

            prop_assert_eq!(buffer.available(), total);
            prop_assert_eq!(buffer.data(), expected.as_slice());
        }

        #[test]
        fn prop_compact_keeps_suffix(
            data in proptest::collection::vec(any::<u8>(), 0..128),
            cut in any::<prop::sample::Index>(),
        ) {
            let mut buffer = AccumulationBuffer::new(128);
            buffer.append(&data).unwrap();

            let n = cut.index(data.len() + 1);
            buffer.compact(n).unwrap();

            prop_assert_eq!(buffer.available(), data.len() - n);
            prop_assert_eq!(buffer.data(), &data[n..]);
        }
    }
}
