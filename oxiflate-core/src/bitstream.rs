//! Bit-level I/O for the DEFLATE bitstream.
//!
//! This module provides [`BitReader`] and [`BitWriter`] for sequential,
//! bit-granular access to a byte stream.
//!
//! # Bit Ordering
//!
//! DEFLATE packs bits into bytes starting at the least significant bit of
//! each byte. On top of that packing, two value orders are used:
//!
//! - **LSB-first** ([`BitReader::read_bits`], [`BitWriter::write_bits`]):
//!   the value's least significant bit goes out first. Header fields, stored
//!   block lengths and extra bits use this order.
//! - **MSB-first** ([`BitReader::read_bits_msb`], [`BitWriter::write_bits_msb`]):
//!   the value's most significant bit goes out first. Huffman codes use this
//!   order so that a canonical code value maps directly onto the bit string.
//!
//! # Example
//!
//! ```
//! use oxiflate_core::bitstream::{BitReader, BitWriter};
//! use std::io::Cursor;
//!
//! let mut writer = BitWriter::new(Vec::new());
//! writer.write_bits(0b101, 3).unwrap();      // header field
//! writer.write_bits_msb(0b0011, 4).unwrap(); // Huffman code
//! let output = writer.into_inner().unwrap();
//!
//! let mut reader = BitReader::new(Cursor::new(output));
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.read_bits_msb(4).unwrap(), 0b0011);
//! ```

use crate::error::{FlateError, Result};
use std::io::{self, Read, Write};

/// Reverse the low `count` bits of `value`.
///
/// Bits above `count` are discarded.
#[inline]
pub fn reverse_bits(value: u32, count: u8) -> u32 {
    if count == 0 {
        return 0;
    }
    value.reverse_bits() >> (32 - u32::from(count))
}

/// A bit-level reader that wraps any `Read` implementation.
///
/// Bytes are pulled from the underlying reader on demand into a 64-bit
/// buffer. Running out of input while bits are still required yields
/// [`FlateError::UnexpectedEof`].
///
/// Over a cloneable source such as `&[u8]`, a clone of the reader is a
/// cheap checkpoint to rewind to.
#[derive(Debug, Clone)]
pub struct BitReader<R: Read> {
    /// Underlying reader.
    reader: R,
    /// Bit buffer (LSB-first).
    buffer: u64,
    /// Number of valid bits in buffer.
    bits_in_buffer: u8,
    /// Total bits consumed (for error reporting).
    total_bits_read: u64,
}

impl<R: Read> BitReader<R> {
    /// Create a new `BitReader` wrapping the given reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: 0,
            bits_in_buffer: 0,
            total_bits_read: 0,
        }
    }

    /// Get a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Consume this `BitReader` and return the underlying reader.
    ///
    /// Bits already buffered but not consumed are lost.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Get the current bit position (for error reporting).
    pub fn bit_position(&self) -> u64 {
        self.total_bits_read
    }

    /// Ensure at least `count` bits are available in the buffer.
    fn fill_buffer(&mut self, count: u8) -> Result<()> {
        debug_assert!(count <= 32, "Cannot fill more than 32 bits at once");

        while self.bits_in_buffer < count {
            let wanted = usize::from((count - self.bits_in_buffer).div_ceil(8));
            let mut temp = [0u8; 4];
            let n = match self.reader.read(&mut temp[..wanted]) {
                Ok(0) => return Err(FlateError::unexpected_eof(self.total_bits_read)),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            for &byte in &temp[..n] {
                self.buffer |= u64::from(byte) << self.bits_in_buffer;
                self.bits_in_buffer += 8;
            }
        }
        Ok(())
    }

    #[inline]
    fn consume(&mut self, count: u8) {
        self.buffer >>= count;
        self.bits_in_buffer -= count;
        self.total_bits_read += u64::from(count);
    }

    /// Read up to 32 bits, least significant bit first.
    ///
    /// The first bit read lands in bit 0 of the result.
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32, "Cannot read more than 32 bits at once");

        if count == 0 {
            return Ok(0);
        }

        self.fill_buffer(count)?;
        let mask = (1u64 << count) - 1;
        let result = (self.buffer & mask) as u32;
        self.consume(count);
        Ok(result)
    }

    /// Read up to 32 bits, most significant bit first.
    ///
    /// The first bit read lands in bit `count - 1` of the result.
    #[inline]
    pub fn read_bits_msb(&mut self, count: u8) -> Result<u32> {
        Ok(reverse_bits(self.read_bits(count)?, count))
    }

    /// Peek at up to 32 bits without consuming them (LSB-first).
    pub fn peek_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32, "Cannot peek more than 32 bits at once");

        if count == 0 {
            return Ok(0);
        }

        self.fill_buffer(count)?;
        let mask = (1u64 << count) - 1;
        Ok((self.buffer & mask) as u32)
    }

    /// Peek at up to `count` bits, returning however many are available.
    ///
    /// Returns `(bits, available)` where `available <= count`. Only fails on
    /// I/O errors; end of input simply shortens the result.
    pub fn peek_available(&mut self, count: u8) -> Result<(u32, u8)> {
        debug_assert!(count <= 32, "Cannot peek more than 32 bits at once");

        match self.fill_buffer(count) {
            Ok(()) => {}
            Err(FlateError::UnexpectedEof { .. }) => {}
            Err(e) => return Err(e),
        }
        let available = self.bits_in_buffer.min(count);
        let mask = (1u64 << available) - 1;
        Ok(((self.buffer & mask) as u32, available))
    }

    /// Skip `count` bits.
    pub fn skip_bits(&mut self, count: u8) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        self.fill_buffer(count)?;
        self.consume(count);
        Ok(())
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Discard bits up to the next byte boundary.
    pub fn byte_align(&mut self) {
        let remainder = (self.total_bits_read % 8) as u8;
        if remainder > 0 {
            // The partial byte is always buffered: bits are only consumed
            // after their byte has been loaded.
            self.consume(8 - remainder);
        }
    }

    /// Read whole bytes. The reader must be byte-aligned.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        debug_assert!(self.total_bits_read % 8 == 0, "read_bytes on unaligned reader");

        let mut offset = 0;
        while self.bits_in_buffer >= 8 && offset < buf.len() {
            buf[offset] = (self.buffer & 0xFF) as u8;
            self.consume(8);
            offset += 1;
        }

        if offset < buf.len() {
            self.reader
                .read_exact(&mut buf[offset..])
                .map_err(|e| match e.kind() {
                    io::ErrorKind::UnexpectedEof => {
                        FlateError::unexpected_eof(self.total_bits_read)
                    }
                    _ => FlateError::Io(e),
                })?;
            self.total_bits_read += (buf.len() - offset) as u64 * 8;
        }

        Ok(())
    }
}

/// A bit-level writer that wraps any `Write` implementation.
///
/// Complete bytes are forwarded to the underlying writer as soon as they are
/// formed; at most seven bits stay pending between calls. Call
/// [`BitWriter::flush`] or [`BitWriter::into_inner`] to pad and emit the
/// final partial byte.
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    /// Underlying writer.
    writer: W,
    /// Bit buffer (LSB-first).
    buffer: u64,
    /// Number of bits in buffer.
    bits_in_buffer: u8,
    /// Total bits written.
    total_bits_written: u64,
}

impl<W: Write> BitWriter<W> {
    /// Create a new `BitWriter` wrapping the given writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: 0,
            bits_in_buffer: 0,
            total_bits_written: 0,
        }
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Get a mutable reference to the underlying writer.
    ///
    /// Pending bits of an incomplete byte are not visible here.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Pad to a byte boundary, flush, and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.writer)
    }

    /// Get the total number of bits written so far, padding included.
    pub fn bits_written(&self) -> u64 {
        self.total_bits_written
    }

    /// Number of bits pending in the incomplete trailing byte.
    pub fn pending_bits(&self) -> u8 {
        self.bits_in_buffer
    }

    /// Move complete bytes from the buffer to the writer.
    #[inline]
    fn flush_bytes(&mut self) -> Result<()> {
        if self.bits_in_buffer < 8 {
            return Ok(());
        }
        let count = usize::from(self.bits_in_buffer / 8);
        let bytes = self.buffer.to_le_bytes();
        self.writer.write_all(&bytes[..count])?;
        if count == 8 {
            self.buffer = 0;
        } else {
            self.buffer >>= count * 8;
        }
        self.bits_in_buffer -= (count * 8) as u8;
        Ok(())
    }

    /// Write up to 32 bits, least significant bit first.
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u8) -> Result<()> {
        debug_assert!(count <= 32, "Cannot write more than 32 bits at once");

        if count == 0 {
            return Ok(());
        }

        let mask = if count == 32 {
            u32::MAX
        } else {
            (1u32 << count) - 1
        };
        self.buffer |= u64::from(value & mask) << self.bits_in_buffer;
        self.bits_in_buffer += count;
        self.total_bits_written += u64::from(count);

        self.flush_bytes()
    }

    /// Write up to 32 bits, most significant bit first.
    #[inline]
    pub fn write_bits_msb(&mut self, value: u32, count: u8) -> Result<()> {
        self.write_bits(reverse_bits(value, count), count)
    }

    /// Write a single bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.write_bits(u32::from(bit), 1)
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn byte_align(&mut self) -> Result<()> {
        if self.bits_in_buffer % 8 != 0 {
            let padding = 8 - (self.bits_in_buffer % 8);
            self.write_bits(0, padding)?;
        }
        Ok(())
    }

    /// Pad to a byte boundary and flush the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.byte_align()?;
        self.flush_bytes()?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write whole bytes. The writer should be byte-aligned.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.flush_bytes()?;

        if self.bits_in_buffer > 0 {
            for &byte in buf {
                self.write_bits(u32::from(byte), 8)?;
            }
        } else {
            self.writer.write_all(buf)?;
            self.total_bits_written += buf.len() as u64 * 8;
        }

        Ok(())
    }
}
