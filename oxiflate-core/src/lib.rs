//! # OxiFlate Core
//!
//! Core components shared by the OxiFlate codec.
//!
//! - [`bitstream`]: Bit-level I/O with LSB-first and MSB-first value orders
//! - [`ringbuffer`]: 32 KiB sliding window for back-reference replay
//! - [`crc`]: CRC-32 checksum for outer containers
//! - [`traits`]: Streaming compression/decompression traits
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L2: Codec (oxiflate-deflate)                            │
//! │     LZ77 match finder, canonical Huffman, block framing │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: BitStream (this crate)                              │
//! │     BitReader/BitWriter, RingBuffer, CRC-32             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_core::bitstream::BitReader;
//! use oxiflate_core::crc::Crc32;
//! use std::io::Cursor;
//!
//! let mut reader = BitReader::new(Cursor::new(vec![0xAB, 0xCD]));
//! assert_eq!(reader.read_bits(12).unwrap(), 0xDAB);
//!
//! assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod crc;
pub mod error;
pub mod ringbuffer;
pub mod traits;

// Re-exports for convenience
pub use bitstream::{BitReader, BitWriter, reverse_bits};
pub use crc::Crc32;
pub use error::{ErrorKind, FlateError, Result};
pub use ringbuffer::{RingBuffer, WINDOW_SIZE};
pub use traits::{
    CompressStatus, CompressionLevel, Compressor, DecompressStatus, Decompressor, FlushMode,
    Progress,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bitstream::{BitReader, BitWriter};
    pub use crate::crc::Crc32;
    pub use crate::error::{ErrorKind, FlateError, Result};
    pub use crate::ringbuffer::RingBuffer;
    pub use crate::traits::{CompressionLevel, Compressor, Decompressor, FlushMode};
}
