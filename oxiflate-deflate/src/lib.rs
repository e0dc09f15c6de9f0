//! # OxiFlate Deflate
//!
//! Pure Rust implementation of the DEFLATE compression algorithm (RFC 1951).
//!
//! This crate produces and consumes raw DEFLATE bitstreams. Container
//! framing (gzip, zlib, ZIP entries) is left to the caller, which can use
//! the CRC-32 and size counters reported by [`Deflater`] and [`Inflater`].
//!
//! ## Features
//!
//! - **Decompression**: all three block types
//!   - Stored (uncompressed) blocks
//!   - Fixed Huffman codes
//!   - Dynamic Huffman codes
//! - **Compression**: LZ77 + Huffman encoding
//!   - Hash-chained match finder with optional lazy matching
//!   - Per-block choice of stored, fixed or dynamic encoding by exact bit cost
//!   - Incremental input with [`Deflater::write`] and sync flush points
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_deflate::{deflate, inflate};
//!
//! // Compress data
//! let original = b"Hello, World! Hello, World!";
//! let compressed = deflate(original, 6).unwrap();
//!
//! // Decompress data
//! let decompressed = inflate(&compressed).unwrap();
//! assert_eq!(&decompressed, original);
//! ```
//!
//! ## Compression Levels
//!
//! - Level 0: No compression (stored blocks)
//! - Level 1-3: Fast compression, greedy matching
//! - Level 4-6: Balanced, lazy matching (default is 6)
//! - Level 7-9: Best compression (slower)
//!
//! Finer control is available through [`DeflateConfig`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod block;
pub mod config;
pub mod deflate;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod tables;

// Re-exports
pub use block::{BlockStats, BlockType};
pub use config::{BlockStrategy, DeflateConfig};
pub use deflate::{Deflater, deflate, deflate_with};
pub use huffman::{CodeTable, DecodeTable, HuffmanBuilder, HuffmanCode};
pub use inflate::{Inflater, inflate};
pub use lz77::{MatchFinder, Token};
