//! Error types for OxiFlate operations.
//!
//! Every failure in the codec is reported through [`FlateError`]. The
//! variants fall into a small taxonomy exposed by [`FlateError::kind`]:
//!
//! - [`ErrorKind::Format`]: the stream violates the DEFLATE grammar
//!   (reserved block type, header counts out of range, code-length overrun).
//! - [`ErrorKind::Corruption`]: the stream is grammatical but its content is
//!   inconsistent (distance too far back, no matching code, LEN/NLEN
//!   mismatch, premature end of input).
//! - [`ErrorKind::Range`]: an encoder-side value outside the encodable range.
//! - [`ErrorKind::Io`]: the underlying reader or writer failed.
//! - [`ErrorKind::Usage`]: the API was driven in an invalid order.
//!
//! None of these are recoverable inside the codec; they propagate to the caller.

use std::io;
use thiserror::Error;

/// The main error type for OxiFlate operations.
#[derive(Debug, Error)]
pub enum FlateError {
    /// I/O error from underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Block header carries the reserved type `11`.
    #[error("Invalid block type: {btype}")]
    InvalidBlockType {
        /// The 2-bit BTYPE value read from the stream.
        btype: u8,
    },

    /// Invalid block header or code-length description.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// A Huffman bit sequence matched no code up to the maximum length.
    #[error("Invalid Huffman code at bit position {bit_position}")]
    InvalidHuffmanCode {
        /// Bit position where the invalid code was found.
        bit_position: u64,
    },

    /// Corrupted data in the compressed stream.
    #[error("Corrupted data at offset {offset}: {message}")]
    CorruptedData {
        /// Output byte offset where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Stored block length does not match its one's complement.
    #[error("Stored block length mismatch: LEN={len:#06x}, NLEN={nlen:#06x}")]
    StoredLengthMismatch {
        /// The LEN field.
        len: u16,
        /// The NLEN field.
        nlen: u16,
    },

    /// Input ended while more bits were required.
    #[error("Unexpected end of stream at bit position {bit_position}")]
    UnexpectedEof {
        /// Bit position at which the input ran out.
        bit_position: u64,
    },

    /// Back-reference reaching before the start of the produced output.
    #[error("Invalid back-reference distance: {distance} exceeds history size {history_size}")]
    InvalidDistance {
        /// The invalid distance value.
        distance: usize,
        /// Number of bytes available in the history.
        history_size: usize,
    },

    /// A match field outside the range the format can encode.
    #[error("{what} {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Which quantity was out of range.
        what: &'static str,
        /// The offending value.
        value: u32,
        /// Smallest encodable value.
        min: u32,
        /// Largest encodable value.
        max: u32,
    },

    /// The encoder tried to emit a symbol that has no code in the table.
    #[error("Symbol {symbol} has no code in the current table")]
    UncodedSymbol {
        /// The symbol that was requested.
        symbol: u16,
    },

    /// Input was supplied after the stream was finished.
    #[error("Stream already finished")]
    Finished,
}

/// Coarse classification of a [`FlateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Underlying reader or writer failure.
    Io,
    /// The stream violates the DEFLATE grammar.
    Format,
    /// The stream content is inconsistent or truncated.
    Corruption,
    /// A value outside the encodable range.
    Range,
    /// The API was used out of order.
    Usage,
}

/// Result type alias for OxiFlate operations.
pub type Result<T> = std::result::Result<T, FlateError>;

impl FlateError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidBlockType { .. } | Self::InvalidHeader { .. } => ErrorKind::Format,
            Self::InvalidHuffmanCode { .. }
            | Self::CorruptedData { .. }
            | Self::StoredLengthMismatch { .. }
            | Self::UnexpectedEof { .. }
            | Self::InvalidDistance { .. } => ErrorKind::Corruption,
            Self::OutOfRange { .. } | Self::UncodedSymbol { .. } => ErrorKind::Range,
            Self::Finished => ErrorKind::Usage,
        }
    }

    /// Create an invalid block type error.
    pub fn invalid_block_type(btype: u8) -> Self {
        Self::InvalidBlockType { btype }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an invalid Huffman code error.
    pub fn invalid_huffman(bit_position: u64) -> Self {
        Self::InvalidHuffmanCode { bit_position }
    }

    /// Create a corrupted data error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Create a stored length mismatch error.
    pub fn stored_length_mismatch(len: u16, nlen: u16) -> Self {
        Self::StoredLengthMismatch { len, nlen }
    }

    /// Create an unexpected end-of-stream error.
    pub fn unexpected_eof(bit_position: u64) -> Self {
        Self::UnexpectedEof { bit_position }
    }

    /// Create an invalid distance error.
    pub fn invalid_distance(distance: usize, history_size: usize) -> Self {
        Self::InvalidDistance {
            distance,
            history_size,
        }
    }

    /// Create an out-of-range error.
    pub fn out_of_range(what: &'static str, value: u32, min: u32, max: u32) -> Self {
        Self::OutOfRange {
            what,
            value,
            min,
            max,
        }
    }

    /// Create an uncoded symbol error.
    pub fn uncoded_symbol(symbol: u16) -> Self {
        Self::UncodedSymbol { symbol }
    }
}
