//! Ring buffer (sliding window) for LZ77 back-references.
//!
//! The decoder keeps the most recent [`WINDOW_SIZE`] output bytes here so
//! that `(distance, length)` pairs can be resolved without retaining the
//! whole output. Slots older than the window are simply overwritten.

use crate::error::{FlateError, Result};

/// DEFLATE window size (32 KiB), the maximum back-reference distance.
pub const WINDOW_SIZE: usize = 32768;

/// A ring buffer holding decompression history.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    /// The underlying buffer.
    buffer: Vec<u8>,
    /// Next write index.
    position: usize,
    /// Number of valid bytes (saturates at capacity).
    size: usize,
    /// Mask for modulo indexing (capacity - 1).
    mask: usize,
}

impl RingBuffer {
    /// Create a new ring buffer with the specified capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of 2.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "Capacity must be a power of 2, got {}",
            capacity
        );

        Self {
            buffer: vec![0; capacity],
            position: 0,
            size: 0,
            mask: capacity - 1,
        }
    }

    /// Create a ring buffer sized for DEFLATE (32 KiB).
    pub fn deflate() -> Self {
        Self::new(WINDOW_SIZE)
    }

    /// Capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of bytes of history currently available.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check if no history is available.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Forget all history.
    pub fn clear(&mut self) {
        self.position = 0;
        self.size = 0;
    }

    /// Append a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buffer[self.position] = byte;
        self.position = (self.position + 1) & self.mask;
        if self.size <= self.mask {
            self.size += 1;
        }
    }

    /// Append a run of bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        let capacity = self.capacity();
        // Only the tail can survive in the window.
        let data = &data[data.len().saturating_sub(capacity)..];
        let first = data.len().min(capacity - self.position);
        self.buffer[self.position..self.position + first].copy_from_slice(&data[..first]);
        self.buffer[..data.len() - first].copy_from_slice(&data[first..]);
        self.position = (self.position + data.len()) & self.mask;
        self.size = (self.size + data.len()).min(capacity);
    }

    /// Read the byte `distance` positions back (1 is the most recent).
    pub fn read_at_distance(&self, distance: usize) -> Result<u8> {
        if distance == 0 || distance > self.size {
            return Err(FlateError::invalid_distance(distance, self.size));
        }
        Ok(self.buffer[self.position.wrapping_sub(distance) & self.mask])
    }

    /// Replay a back-reference, appending the copied bytes to `sink`.
    ///
    /// Bytes are copied one at a time in forward order, so when
    /// `length > distance` the bytes produced by this call become the source
    /// for the rest of the copy.
    pub fn copy_match(&mut self, distance: usize, length: usize, sink: &mut Vec<u8>) -> Result<()> {
        if distance == 0 || distance > self.size {
            return Err(FlateError::invalid_distance(distance, self.size));
        }

        sink.reserve(length);
        let mut src = self.position.wrapping_sub(distance) & self.mask;
        for _ in 0..length {
            let byte = self.buffer[src];
            sink.push(byte);
            self.write_byte(byte);
            src = (src + 1) & self.mask;
        }
        Ok(())
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::deflate()
    }
}
