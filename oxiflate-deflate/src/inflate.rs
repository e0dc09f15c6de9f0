//! DEFLATE decompression.
//!
//! This module implements the DEFLATE decompression algorithm as specified
//! in RFC 1951. Decoding is a resumable state machine: each step reads one
//! block header, one literal or match, or one slice of a stored block, and
//! either completes or leaves the decoder untouched. Decoded bytes go
//! through a 32 KiB [`RingBuffer`] that serves back-references and are
//! handed out in chunks, so memory stays bounded regardless of stream size.

use crate::block::{BlockStats, BlockType, REPEAT_PREVIOUS, REPEAT_ZERO_LONG, REPEAT_ZERO_SHORT};
use crate::huffman::{
    CODELEN_ALPHABET_SIZE, DISTANCE_ALPHABET_SIZE, DecodeTable, END_OF_BLOCK, LITLEN_ALPHABET_SIZE,
};
use crate::tables::{
    CODE_LENGTH_ORDER, distance_base_for, fixed_distance_decoder, fixed_litlen_decoder,
    length_base_for,
};
use log::{debug, trace};
use oxiflate_core::bitstream::BitReader;
use oxiflate_core::crc::Crc32;
use oxiflate_core::error::{FlateError, Result};
use oxiflate_core::ringbuffer::RingBuffer;
use oxiflate_core::traits::{DecompressStatus, Decompressor, Progress};
use std::io::{Read, Write};

/// Decoded bytes are handed out once this many are pending.
const FLUSH_CHUNK: usize = 32 * 1024;

/// Huffman tables of the block being decoded.
#[derive(Debug)]
enum CodeTables {
    Fixed,
    Dynamic(Box<(DecodeTable, DecodeTable)>),
}

impl CodeTables {
    fn decoders(&self) -> (&DecodeTable, &DecodeTable) {
        match self {
            Self::Fixed => (fixed_litlen_decoder(), fixed_distance_decoder()),
            Self::Dynamic(tables) => (&tables.0, &tables.1),
        }
    }

    fn kind(&self) -> BlockType {
        match self {
            Self::Fixed => BlockType::Fixed,
            Self::Dynamic(_) => BlockType::Dynamic,
        }
    }
}

/// Where the decoder stands within the stream.
#[derive(Debug)]
enum BlockState {
    /// Next up is a block header.
    Header,
    /// Inside a stored block.
    Stored { remaining: usize },
    /// Inside a Huffman-coded block.
    Codes(CodeTables),
    /// The final block has been decoded.
    Done,
}

/// One decoded literal/length symbol with its distance, if any.
enum Symbol {
    Literal(u8),
    Copy { length: usize, distance: usize },
    EndOfBlock,
}

/// Why a run of decoding steps over buffered input stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// A full chunk of output is pending.
    Filled,
    /// The next step needs bytes that have not arrived yet.
    NeedsInput,
    /// The final block is complete.
    Done,
}

/// DEFLATE decompressor.
///
/// Decodes either from a [`Read`] source into a [`Write`] sink with
/// [`Inflater::inflate_to`], or incrementally through [`Decompressor`].
/// Any decoding error resets the inflater, so a later stream never sees
/// history from a failed one.
#[derive(Debug)]
pub struct Inflater {
    state: BlockState,
    /// BFINAL of the block being decoded.
    last_block: bool,
    /// Back-reference history.
    window: RingBuffer,
    /// Decoded bytes not yet handed out.
    pending: Vec<u8>,
    /// Bytes of `pending` already delivered by [`Decompressor::decompress`].
    delivered: usize,
    /// Input of an unfinished step, kept between `decompress` calls.
    carry: Vec<u8>,
    /// Bits of `carry[0]` already consumed.
    carry_bits: u8,
    /// Compressed bytes accepted by `decompress` so far.
    accepted: u64,
    /// Absolute bit offset of the reader currently in use.
    base_bits: u64,
    crc: Crc32,
    total_in: u64,
    total_out: u64,
    stats: BlockStats,
    progress: Option<Progress>,
}

impl Inflater {
    /// Create a new decompressor.
    pub fn new() -> Self {
        Self {
            state: BlockState::Header,
            last_block: false,
            window: RingBuffer::deflate(),
            pending: Vec::with_capacity(FLUSH_CHUNK + 258),
            delivered: 0,
            carry: Vec::new(),
            carry_bits: 0,
            accepted: 0,
            base_bits: 0,
            crc: Crc32::new(),
            total_in: 0,
            total_out: 0,
            stats: BlockStats::default(),
            progress: None,
        }
    }

    /// Report compressed bytes consumed after every decoded block.
    pub fn set_progress(&mut self, callback: impl FnMut(u64) + Send + 'static) {
        self.progress = Some(Progress::new(callback));
    }

    /// Reset to decode a new stream. A progress callback is kept.
    pub fn reset(&mut self) {
        self.state = BlockState::Header;
        self.last_block = false;
        self.window.clear();
        self.pending.clear();
        self.delivered = 0;
        self.carry.clear();
        self.carry_bits = 0;
        self.accepted = 0;
        self.base_bits = 0;
        self.crc.reset();
        self.total_in = 0;
        self.total_out = 0;
        self.stats = BlockStats::default();
    }

    /// Decode one complete stream from `reader`, writing the output to
    /// `sink`. Returns the number of bytes written.
    ///
    /// Data after the final block is left unread in the bit reader's
    /// buffer; a stream that ends early fails with
    /// [`FlateError::UnexpectedEof`]. Calling this on a finished inflater
    /// fails with [`FlateError::Finished`] until [`Inflater::reset`].
    pub fn inflate_to<R: Read, W: Write>(&mut self, reader: R, sink: &mut W) -> Result<u64> {
        if self.is_finished() {
            return Err(FlateError::Finished);
        }

        let mut reader = BitReader::new(reader);
        self.base_bits = 0;
        if let Err(e) = self.inflate_stream(&mut reader, sink) {
            self.reset();
            return Err(e);
        }
        Ok(self.total_out)
    }

    /// Step through blocks until the final one completes.
    fn inflate_stream<R: Read, W: Write>(
        &mut self,
        reader: &mut BitReader<R>,
        sink: &mut W,
    ) -> Result<()> {
        while !self.is_finished() {
            self.step(reader, FLUSH_CHUNK.saturating_sub(self.pending.len()))?;
            if self.pending.len() >= FLUSH_CHUNK {
                self.flush_pending(sink)?;
            }
        }

        self.flush_pending(sink)?;
        sink.flush()?;
        debug!(
            "inflate finished: in={} out={} blocks={:?}",
            self.total_in, self.total_out, self.stats
        );
        Ok(())
    }

    /// Run steps over the buffered input in `reader` until a chunk of
    /// output is pending, input runs short, or the stream ends.
    ///
    /// A step that hits the end of `reader` is rolled back.
    fn decode_available(
        &mut self,
        reader: &mut BitReader<&[u8]>,
        total_bits: u64,
    ) -> Result<Outcome> {
        loop {
            if self.is_finished() {
                return Ok(Outcome::Done);
            }
            if self.pending.len() >= FLUSH_CHUNK {
                return Ok(Outcome::Filled);
            }

            let room = FLUSH_CHUNK - self.pending.len();
            let budget = match self.state {
                BlockState::Stored { remaining } if remaining > 0 => {
                    let available = ((total_bits - reader.bit_position()) / 8) as usize;
                    if available == 0 {
                        return Ok(Outcome::NeedsInput);
                    }
                    available.min(room)
                }
                _ => room,
            };

            let checkpoint = reader.clone();
            match self.step(reader, budget) {
                Ok(()) => {}
                Err(FlateError::UnexpectedEof { .. }) => {
                    *reader = checkpoint;
                    return Ok(Outcome::NeedsInput);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Advance by one header, one symbol, or up to `budget` stored bytes.
    ///
    /// Nothing is modified unless every bit the step needs was available.
    fn step<R: Read>(&mut self, reader: &mut BitReader<R>, budget: usize) -> Result<()> {
        if matches!(self.state, BlockState::Header) {
            let (is_final, next) = read_block_header(reader)?;
            self.last_block = is_final;
            self.state = next;
            return Ok(());
        }

        let ended = match &mut self.state {
            BlockState::Header | BlockState::Done => None,
            BlockState::Stored { remaining } => {
                let n = (*remaining).min(budget);
                if n > 0 {
                    let start = self.pending.len();
                    self.pending.resize(start + n, 0);
                    if let Err(e) = reader.read_bytes(&mut self.pending[start..]) {
                        self.pending.truncate(start);
                        return Err(e);
                    }
                    self.window.write_bytes(&self.pending[start..]);
                    *remaining -= n;
                }
                (*remaining == 0).then_some(BlockType::Stored)
            }
            BlockState::Codes(tables) => {
                let (litlen, distance) = tables.decoders();
                match decode_symbol(reader, litlen, distance)? {
                    Symbol::Literal(byte) => {
                        self.window.write_byte(byte);
                        self.pending.push(byte);
                        None
                    }
                    Symbol::Copy { length, distance } => {
                        self.window.copy_match(distance, length, &mut self.pending)?;
                        None
                    }
                    Symbol::EndOfBlock => Some(tables.kind()),
                }
            }
        };

        if let Some(kind) = ended {
            self.finish_block(kind, reader.bit_position());
        }
        Ok(())
    }

    fn finish_block(&mut self, kind: BlockType, bit_position: u64) {
        self.stats.record(kind);
        self.total_in = (self.base_bits + bit_position).div_ceil(8);
        debug!(
            "block: {:?}, final={} in={} out={}",
            kind,
            self.last_block,
            self.total_in,
            self.total_out + (self.pending.len() - self.delivered) as u64
        );
        self.state = if self.last_block {
            BlockState::Done
        } else {
            BlockState::Header
        };
        if let Some(progress) = &mut self.progress {
            progress.report(self.total_in);
        }
    }

    fn flush_pending<W: Write>(&mut self, sink: &mut W) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        sink.write_all(&self.pending)?;
        self.crc.update(&self.pending);
        self.total_out += self.pending.len() as u64;
        self.pending.clear();
        Ok(())
    }

    /// Copy pending bytes into `output`; returns how many were copied.
    fn deliver(&mut self, output: &mut [u8]) -> usize {
        let available = &self.pending[self.delivered..];
        let n = available.len().min(output.len());
        output[..n].copy_from_slice(&available[..n]);
        self.crc.update(&available[..n]);
        self.total_out += n as u64;
        self.delivered += n;
        if self.delivered == self.pending.len() {
            self.pending.clear();
            self.delivered = 0;
        }
        n
    }

    /// CRC-32 of the output handed out so far.
    pub fn crc32(&self) -> u32 {
        self.crc.value()
    }

    /// Compressed bytes consumed through the last completed block.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Number of decoded bytes handed out so far.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Per-type block counts.
    pub fn stats(&self) -> BlockStats {
        self.stats
    }

    /// Check if the final block has been decoded.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, BlockState::Done)
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

/// Read BFINAL, BTYPE and whatever the block type puts before its data.
fn read_block_header<R: Read>(reader: &mut BitReader<R>) -> Result<(bool, BlockState)> {
    let is_final = reader.read_bit()?;
    let state = match BlockType::from_bits(reader.read_bits(2)?)? {
        BlockType::Stored => {
            reader.byte_align();
            let len = reader.read_bits(16)? as u16;
            let nlen = reader.read_bits(16)? as u16;
            if len != !nlen {
                return Err(FlateError::stored_length_mismatch(len, nlen));
            }
            BlockState::Stored {
                remaining: usize::from(len),
            }
        }
        BlockType::Fixed => BlockState::Codes(CodeTables::Fixed),
        BlockType::Dynamic => {
            let (litlen, distance) = read_code_lengths(reader)?;
            let litlen = DecodeTable::from_lengths(&litlen)?;
            let distance = DecodeTable::from_lengths(&distance)?;
            BlockState::Codes(CodeTables::Dynamic(Box::new((litlen, distance))))
        }
    };
    Ok((is_final, state))
}

/// Decode a literal, end-of-block, or a complete length/distance pair.
fn decode_symbol<R: Read>(
    reader: &mut BitReader<R>,
    litlen: &DecodeTable,
    distance: &DecodeTable,
) -> Result<Symbol> {
    let symbol = litlen.decode_symbol(reader)?;
    if symbol < END_OF_BLOCK {
        return Ok(Symbol::Literal(symbol as u8));
    }
    if symbol == END_OF_BLOCK {
        return Ok(Symbol::EndOfBlock);
    }

    let (base, bits) = length_base_for(symbol).ok_or_else(|| {
        FlateError::corrupted(
            reader.bit_position() / 8,
            format!("invalid literal/length symbol {symbol}"),
        )
    })?;
    let length = usize::from(base) + reader.read_bits(bits)? as usize;

    let dist_symbol = distance.decode_symbol(reader)?;
    let (base, bits) = distance_base_for(dist_symbol).ok_or_else(|| {
        FlateError::corrupted(
            reader.bit_position() / 8,
            format!("invalid distance symbol {dist_symbol}"),
        )
    })?;
    let distance = usize::from(base) + reader.read_bits(bits)? as usize;

    Ok(Symbol::Copy { length, distance })
}

/// Read the table description of a dynamic block, after BFINAL/BTYPE.
///
/// Returns the literal/length code lengths (`HLIT` entries) and the
/// distance code lengths (`HDIST` entries). Repeat codes may run across
/// the boundary between the two lists.
pub fn read_code_lengths<R: Read>(reader: &mut BitReader<R>) -> Result<(Vec<u8>, Vec<u8>)> {
    let hlit = reader.read_bits(5)? as usize + 257;
    let hdist = reader.read_bits(5)? as usize + 1;
    let hclen = reader.read_bits(4)? as usize + 4;
    trace!("dynamic header: hlit={hlit} hdist={hdist} hclen={hclen}");

    if hlit > LITLEN_ALPHABET_SIZE {
        return Err(FlateError::invalid_header(format!(
            "HLIT {hlit} exceeds {LITLEN_ALPHABET_SIZE}"
        )));
    }
    if hdist > DISTANCE_ALPHABET_SIZE {
        return Err(FlateError::invalid_header(format!(
            "HDIST {hdist} exceeds {DISTANCE_ALPHABET_SIZE}"
        )));
    }

    let mut codelen_lengths = [0u8; CODELEN_ALPHABET_SIZE];
    for &symbol in &CODE_LENGTH_ORDER[..hclen] {
        codelen_lengths[symbol] = reader.read_bits(3)? as u8;
    }
    let codelen = DecodeTable::from_lengths(&codelen_lengths)?;

    let total = hlit + hdist;
    let mut lengths: Vec<u8> = Vec::with_capacity(total);
    while lengths.len() < total {
        let symbol = codelen.decode_symbol(reader)?;
        let (value, repeat) = match symbol as u8 {
            len @ 0..=15 => (len, 1),
            REPEAT_PREVIOUS => {
                let Some(&prev) = lengths.last() else {
                    return Err(FlateError::invalid_header(
                        "repeat code 16 with no previous length",
                    ));
                };
                (prev, reader.read_bits(2)? as usize + 3)
            }
            REPEAT_ZERO_SHORT => (0, reader.read_bits(3)? as usize + 3),
            REPEAT_ZERO_LONG => (0, reader.read_bits(7)? as usize + 11),
            _ => return Err(FlateError::invalid_huffman(reader.bit_position())),
        };

        if lengths.len() + repeat > total {
            return Err(FlateError::invalid_header(format!(
                "code lengths overrun: {} + {repeat} > {total}",
                lengths.len()
            )));
        }
        lengths.resize(lengths.len() + repeat, value);
    }

    let distance = lengths.split_off(hlit);
    if lengths[usize::from(END_OF_BLOCK)] == 0 {
        return Err(FlateError::invalid_header("end-of-block symbol has no code"));
    }

    Ok((lengths, distance))
}

impl Decompressor for Inflater {
    /// Decode as much of `input` as fits in `output`.
    ///
    /// Input is consumed only as far as decoding got. The bytes of a step
    /// cut short by the end of `input` are kept internally and count as
    /// consumed; once the final block completes, bytes after it are left
    /// unconsumed.
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(usize, usize, DecompressStatus)> {
        let mut produced = self.deliver(output);
        if self.delivered < self.pending.len() {
            return Ok((0, produced, DecompressStatus::NeedsOutput));
        }
        if self.is_finished() {
            return Ok((0, produced, DecompressStatus::Done));
        }

        let carried = self.carry.len();
        let mut joined = std::mem::take(&mut self.carry);
        let data: &[u8] = if joined.is_empty() {
            input
        } else {
            joined.extend_from_slice(input);
            &joined
        };

        self.base_bits = (self.accepted - carried as u64) * 8;
        let mut reader = BitReader::new(data);
        reader.skip_bits(self.carry_bits)?;

        let outcome = loop {
            let outcome = match self.decode_available(&mut reader, data.len() as u64 * 8) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.reset();
                    return Err(e);
                }
            };
            produced += self.deliver(&mut output[produced..]);
            if outcome != Outcome::Filled || self.delivered < self.pending.len() {
                break outcome;
            }
        };

        let position = reader.bit_position();
        let byte = (position / 8) as usize;
        let bit = (position % 8) as u8;
        self.carry_bits = 0;
        let used = match outcome {
            Outcome::NeedsInput => {
                self.carry = data[byte..].to_vec();
                self.carry_bits = bit;
                data.len()
            }
            Outcome::Done => position.div_ceil(8) as usize,
            Outcome::Filled if bit > 0 => {
                self.carry = vec![data[byte]];
                self.carry_bits = bit;
                byte + 1
            }
            Outcome::Filled => byte,
        };
        let consumed = used.saturating_sub(carried).min(input.len());
        self.accepted += consumed as u64;

        let status = if self.delivered < self.pending.len() {
            DecompressStatus::NeedsOutput
        } else if outcome == Outcome::Done {
            DecompressStatus::Done
        } else {
            DecompressStatus::NeedsInput
        };
        Ok((consumed, produced, status))
    }

    fn reset(&mut self) {
        Inflater::reset(self);
    }

    fn is_finished(&self) -> bool {
        Inflater::is_finished(self) && self.pending.is_empty()
    }
}

/// Decompress DEFLATE data.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    Inflater::new().inflate_to(data, &mut output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxiflate_core::bitstream::BitWriter;
    use oxiflate_core::error::ErrorKind;

    #[test]
    fn test_inflate_stored() {
        // BFINAL=1 BTYPE=00, LEN=5, NLEN=!5, "Hello"
        let compressed = vec![
            0x01, 0x05, 0x00, 0xFA, 0xFF, b'H', b'e', b'l', b'l', b'o',
        ];
        assert_eq!(inflate(&compressed).unwrap(), b"Hello");
    }

    #[test]
    fn test_inflate_empty() {
        let compressed = vec![0x01, 0x00, 0x00, 0xFF, 0xFF];
        assert!(inflate(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_inflate_fixed_reference_stream() {
        // "hello hello hello" from a reference encoder, fixed codes.
        let compressed = [
            0xcb, 0x48, 0xcd, 0xc9, 0xc9, 0x57, 0xc8, 0x40, 0x90, 0x00,
        ];
        let mut inflater = Inflater::new();
        let mut out = Vec::new();
        inflater.inflate_to(&compressed[..], &mut out).unwrap();
        assert_eq!(out, b"hello hello hello");
        assert_eq!(inflater.stats().fixed_blocks, 1);
        assert_eq!(inflater.stats().dynamic_blocks, 0);
        assert_eq!(inflater.crc32(), Crc32::compute(b"hello hello hello"));
        assert_eq!(inflater.total_out(), 17);
    }

    #[test]
    fn test_stored_length_mismatch() {
        let compressed = vec![0x01, 0x05, 0x00, 0x00, 0x00, 1, 2, 3, 4, 5];
        let err = inflate(&compressed).unwrap_err();
        assert!(matches!(err, FlateError::StoredLengthMismatch { len: 5, nlen: 0 }));
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn test_reserved_block_type() {
        // BFINAL=1 BTYPE=11
        let err = inflate(&[0x07, 0x00]).unwrap_err();
        assert!(matches!(err, FlateError::InvalidBlockType { btype: 3 }));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_truncated_stream() {
        let err = inflate(&[0x01, 0x05, 0x00, 0xFA, 0xFF, b'H']).unwrap_err();
        assert!(matches!(err, FlateError::UnexpectedEof { .. }));
        assert!(matches!(inflate(&[]), Err(FlateError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_distance_beyond_output() {
        // Fixed block: literal 'a', then length 3 at distance 2.
        let mut writer = BitWriter::new(Vec::new());
        writer.write_bit(true).unwrap();
        writer.write_bits(1, 2).unwrap();
        let litlen = crate::tables::fixed_litlen_codes();
        litlen.write_symbol(&mut writer, u16::from(b'a')).unwrap();
        litlen.write_symbol(&mut writer, 257).unwrap();
        crate::tables::fixed_distance_codes()
            .write_symbol(&mut writer, 1)
            .unwrap();
        litlen.write_symbol(&mut writer, END_OF_BLOCK).unwrap();
        let data = writer.into_inner().unwrap();

        let err = inflate(&data).unwrap_err();
        assert!(matches!(
            err,
            FlateError::InvalidDistance {
                distance: 2,
                history_size: 1
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn test_reserved_fixed_symbols() {
        for (litlen_symbol, dist_symbol) in [(286u16, None), (257, Some(30u16))] {
            let mut writer = BitWriter::new(Vec::new());
            writer.write_bit(true).unwrap();
            writer.write_bits(1, 2).unwrap();
            crate::tables::fixed_litlen_codes()
                .write_symbol(&mut writer, litlen_symbol)
                .unwrap();
            if let Some(d) = dist_symbol {
                crate::tables::fixed_distance_codes()
                    .write_symbol(&mut writer, d)
                    .unwrap();
            }
            writer.write_bits(0, 16).unwrap();
            let data = writer.into_inner().unwrap();

            let err = inflate(&data).unwrap_err();
            assert!(matches!(err, FlateError::CorruptedData { .. }), "{err:?}");
        }
    }

    /// Dynamic block header with the given counts and code-length code.
    fn dynamic_prefix(hlit: u32, hdist: u32, codelen_lengths: &[(usize, u32)]) -> BitWriter<Vec<u8>> {
        let mut writer = BitWriter::new(Vec::new());
        writer.write_bit(true).unwrap();
        writer.write_bits(2, 2).unwrap();
        writer.write_bits(hlit - 257, 5).unwrap();
        writer.write_bits(hdist - 1, 5).unwrap();
        writer.write_bits(19 - 4, 4).unwrap();
        let mut lengths = [0u32; 19];
        for &(symbol, len) in codelen_lengths {
            lengths[symbol] = len;
        }
        for &symbol in &CODE_LENGTH_ORDER {
            writer.write_bits(lengths[symbol], 3).unwrap();
        }
        writer
    }

    #[test]
    fn test_hlit_out_of_range() {
        let writer = dynamic_prefix(287, 1, &[]);
        let err = inflate(&writer.into_inner().unwrap()).unwrap_err();
        assert!(matches!(err, FlateError::InvalidHeader { .. }));
    }

    #[test]
    fn test_hdist_out_of_range() {
        let writer = dynamic_prefix(257, 31, &[]);
        let err = inflate(&writer.into_inner().unwrap()).unwrap_err();
        assert!(matches!(err, FlateError::InvalidHeader { .. }));
    }

    #[test]
    fn test_repeat_without_previous() {
        // Code-length code: 16 -> "0", 18 -> "1".
        let mut writer = dynamic_prefix(257, 1, &[(16, 1), (18, 1)]);
        writer.write_bits_msb(0, 1).unwrap();
        writer.write_bits(0, 2).unwrap();
        let err = inflate(&writer.into_inner().unwrap()).unwrap_err();
        assert!(matches!(err, FlateError::InvalidHeader { .. }));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_code_length_overrun() {
        // Two 18s of 138 zeros each run past 257 + 1 entries.
        let mut writer = dynamic_prefix(257, 1, &[(8, 1), (18, 1)]);
        for _ in 0..2 {
            writer.write_bits_msb(1, 1).unwrap();
            writer.write_bits(127, 7).unwrap();
        }
        let err = inflate(&writer.into_inner().unwrap()).unwrap_err();
        assert!(matches!(err, FlateError::InvalidHeader { .. }));
    }

    #[test]
    fn test_missing_end_of_block_code() {
        // 1 x length 8 for symbol 0, then zeros for everything else.
        let mut writer = dynamic_prefix(257, 1, &[(8, 1), (0, 2), (18, 2)]);
        writer.write_bits_msb(0b0, 1).unwrap(); // 8
        writer.write_bits_msb(0b11, 2).unwrap(); // 18 x 138
        writer.write_bits(127, 7).unwrap();
        writer.write_bits_msb(0b11, 2).unwrap(); // 18 x 118
        writer.write_bits(107, 7).unwrap();
        writer.write_bits_msb(0b10, 2).unwrap(); // 0 (distance)
        writer.write_bits(0, 16).unwrap();
        let err = inflate(&writer.into_inner().unwrap()).unwrap_err();
        assert!(
            matches!(&err, FlateError::InvalidHeader { message } if message.contains("end-of-block")),
            "{err:?}"
        );
    }

    #[test]
    fn test_oversubscribed_code_lengths() {
        // Three code-length codes of length 1.
        let writer = dynamic_prefix(257, 1, &[(0, 1), (8, 1), (18, 1)]);
        let err = inflate(&writer.into_inner().unwrap()).unwrap_err();
        assert!(matches!(err, FlateError::InvalidHeader { .. }));
    }

    #[test]
    fn test_read_code_lengths_roundtrip() {
        use crate::block::DynamicHeader;
        use crate::huffman::{CodeTable, MAX_CODE_LENGTH};

        let mut litlen_freqs = [0u32; LITLEN_ALPHABET_SIZE];
        for (i, f) in litlen_freqs.iter_mut().enumerate().take(200) {
            *f = (i as u32 % 13) + 1;
        }
        litlen_freqs[256] = 1;
        litlen_freqs[270] = 9;
        let mut dist_freqs = [0u32; DISTANCE_ALPHABET_SIZE];
        dist_freqs[3] = 4;
        dist_freqs[12] = 1;

        let litlen = CodeTable::from_frequencies(&litlen_freqs, MAX_CODE_LENGTH);
        let distance = CodeTable::from_frequencies(&dist_freqs, MAX_CODE_LENGTH);
        let header = DynamicHeader::new(&litlen, &distance);

        let mut writer = BitWriter::new(Vec::new());
        header.write(&mut writer).unwrap();
        let data = writer.into_inner().unwrap();

        let mut reader = BitReader::new(&data[..]);
        let (lit_lengths, dist_lengths) = read_code_lengths(&mut reader).unwrap();
        assert_eq!(lit_lengths, &litlen.lengths()[..header.hlit]);
        assert_eq!(dist_lengths, &distance.lengths()[..header.hdist]);
    }

    /// Feed `data` in `in_chunk` pieces through `out_chunk`-byte buffers.
    fn drive(inflater: &mut Inflater, data: &[u8], in_chunk: usize, out_chunk: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buffer = vec![0u8; out_chunk];
        let mut pos = 0;
        loop {
            let end = (pos + in_chunk).min(data.len());
            let (consumed, produced, status) =
                inflater.decompress(&data[pos..end], &mut buffer).unwrap();
            assert!(consumed <= end - pos);
            assert!(inflater.pending.len() <= FLUSH_CHUNK + 258);
            pos += consumed;
            out.extend_from_slice(&buffer[..produced]);
            match status {
                DecompressStatus::Done => return out,
                DecompressStatus::NeedsInput => {
                    assert_eq!(pos, end, "input left over while asking for more");
                    assert!(pos < data.len(), "stream ended early");
                }
                DecompressStatus::NeedsOutput => {}
            }
        }
    }

    #[test]
    fn test_decompressor_streaming_input() {
        let input: Vec<u8> = b"incremental input, incremental output. "
            .iter()
            .cycle()
            .take(50_000)
            .copied()
            .collect();
        let compressed = crate::deflate::deflate(&input, 6).unwrap();

        let mut inflater = Inflater::new();
        let out = drive(&mut inflater, &compressed, 97, 1000);

        assert!(Decompressor::is_finished(&inflater));
        assert_eq!(out, input);
        assert_eq!(inflater.total_out(), input.len() as u64);
        assert_eq!(inflater.total_in(), compressed.len() as u64);
        assert_eq!(inflater.crc32(), Crc32::compute(&input));
    }

    #[test]
    fn test_decompressor_keeps_state_small() {
        // Small input pieces must not accumulate: only the unfinished step
        // is carried between calls.
        let input: Vec<u8> = (0..600_000u32)
            .map(|i| {
                if (i / 5000) % 2 == 0 {
                    (i % 13) as u8
                } else {
                    (i.wrapping_mul(2_654_435_761) >> 25) as u8
                }
            })
            .collect();
        let compressed = crate::deflate::deflate(&input, 6).unwrap();

        let mut inflater = Inflater::new();
        let mut out = Vec::new();
        let mut buffer = vec![0u8; 4096];
        let mut pos = 0;
        loop {
            let end = (pos + 256).min(compressed.len());
            let (consumed, produced, status) =
                inflater.decompress(&compressed[pos..end], &mut buffer).unwrap();
            pos += consumed;
            out.extend_from_slice(&buffer[..produced]);
            assert!(inflater.carry.len() < 1024, "carry grew to {}", inflater.carry.len());
            assert!(inflater.pending.len() <= FLUSH_CHUNK + 258);
            if status == DecompressStatus::Done {
                break;
            }
        }
        assert_eq!(pos, compressed.len());
        assert_eq!(out, input);
    }

    #[test]
    fn test_decompressor_stored_blocks_tiny_buffers() {
        let input: Vec<u8> = (0..70_000u32).map(|i| (i * 7 % 251) as u8).collect();
        // One block of 70,000 bytes goes out as two stored pieces.
        let config = crate::config::DeflateConfig::STORE.with_block_symbols(100_000);
        let compressed = crate::deflate::deflate_with(&input, &config).unwrap();

        for (in_chunk, out_chunk) in [(7, 3), (1, 1000), (5000, 1)] {
            let mut inflater = Inflater::new();
            assert_eq!(drive(&mut inflater, &compressed, in_chunk, out_chunk), input);
            assert_eq!(inflater.stats().stored_blocks, 2);
        }
    }

    #[test]
    fn test_decompressor_dynamic_blocks_byte_at_a_time() {
        let input: Vec<u8> = b"one byte of input at a time still decodes every block. "
            .iter()
            .cycle()
            .take(30_000)
            .copied()
            .collect();
        let config = crate::config::DeflateConfig::default()
            .with_strategy(crate::config::BlockStrategy::Dynamic)
            .with_block_symbols(500);
        let compressed = crate::deflate::deflate_with(&input, &config).unwrap();

        let mut inflater = Inflater::new();
        assert_eq!(drive(&mut inflater, &compressed, 1, 333), input);
        assert!(inflater.stats().dynamic_blocks > 1);
    }

    #[test]
    fn test_decompressor_trailing_data() {
        let mut data = crate::deflate::deflate(b"payload", 6).unwrap();
        let stream_len = data.len();
        data.extend_from_slice(b"TRAILER");

        let mut inflater = Inflater::new();
        let mut buffer = [0u8; 64];
        let (consumed, produced, status) = inflater.decompress(&data, &mut buffer).unwrap();
        assert_eq!(consumed, stream_len);
        assert_eq!(&buffer[..produced], b"payload");
        assert_eq!(status, DecompressStatus::Done);
    }

    #[test]
    fn test_decompress_all_truncated() {
        let compressed = crate::deflate::deflate(&[9u8; 1000], 6).unwrap();
        let truncated = &compressed[..compressed.len() - 1];
        let err = Inflater::new().decompress_all(truncated).unwrap_err();
        assert!(matches!(err, FlateError::UnexpectedEof { .. }));
    }

    /// A non-final stored block of "abcdef" followed by a broken stored
    /// header.
    const FAILS_AFTER_HISTORY: [u8; 16] = [
        0x00, 0x06, 0x00, 0xF9, 0xFF, b'a', b'b', b'c', b'd', b'e', b'f', 0x01, 0x05, 0x00, 0x00,
        0x00,
    ];

    /// A fixed block opening with a copy at distance 2.
    fn copy_without_history() -> Vec<u8> {
        let mut writer = BitWriter::new(Vec::new());
        writer.write_bit(true).unwrap();
        writer.write_bits(1, 2).unwrap();
        let litlen = crate::tables::fixed_litlen_codes();
        litlen.write_symbol(&mut writer, 257).unwrap();
        crate::tables::fixed_distance_codes()
            .write_symbol(&mut writer, 1)
            .unwrap();
        litlen.write_symbol(&mut writer, END_OF_BLOCK).unwrap();
        writer.into_inner().unwrap()
    }

    #[test]
    fn test_error_discards_history() {
        let mut inflater = Inflater::new();
        let mut out = Vec::new();
        let err = inflater
            .inflate_to(&FAILS_AFTER_HISTORY[..], &mut out)
            .unwrap_err();
        assert!(matches!(err, FlateError::StoredLengthMismatch { .. }));
        assert_eq!(inflater.total_out(), 0);
        assert_eq!(inflater.stats().total_blocks(), 0);

        out.clear();
        let err = inflater
            .inflate_to(&copy_without_history()[..], &mut out)
            .unwrap_err();
        assert!(
            matches!(err, FlateError::InvalidDistance { distance: 2, history_size: 0 }),
            "{err:?}"
        );
    }

    #[test]
    fn test_decompressor_error_discards_history() {
        let mut inflater = Inflater::new();
        let mut buffer = [0u8; 64];
        assert!(inflater.decompress(&FAILS_AFTER_HISTORY, &mut buffer).is_err());

        let err = inflater
            .decompress(&copy_without_history(), &mut buffer)
            .unwrap_err();
        assert!(matches!(err, FlateError::InvalidDistance { distance: 2, .. }), "{err:?}");
    }

    #[test]
    fn test_progress_after_each_block() {
        use std::sync::{Arc, Mutex};

        let input: Vec<u8> = (0..40_000u32).map(|i| (i % 97) as u8).collect();
        let config = crate::config::DeflateConfig::default().with_block_symbols(1000);
        let compressed = crate::deflate::deflate_with(&input, &config).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut inflater = Inflater::new();
        inflater.set_progress(move |n| sink.lock().unwrap().push(n));
        let mut out = Vec::new();
        inflater.inflate_to(&compressed[..], &mut out).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len() as u64, inflater.stats().total_blocks());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last().copied(), Some(compressed.len() as u64));
        assert_eq!(inflater.total_in(), compressed.len() as u64);
    }

    #[test]
    fn test_inflate_to_twice_requires_reset() {
        let compressed = crate::deflate::deflate(b"once", 6).unwrap();
        let mut inflater = Inflater::new();
        let mut out = Vec::new();
        inflater.inflate_to(&compressed[..], &mut out).unwrap();
        assert!(matches!(
            inflater.inflate_to(&compressed[..], &mut out),
            Err(FlateError::Finished)
        ));
        inflater.reset();
        out.clear();
        inflater.inflate_to(&compressed[..], &mut out).unwrap();
        assert_eq!(out, b"once");
    }
}
