//! Block framing for the DEFLATE encoder.
//!
//! A block is a run of tokens serialized with one of three encodings:
//! stored (raw bytes), fixed Huffman, or dynamic Huffman with its own code
//! tables in the header. This module computes symbol histograms, exact bit
//! costs for each encoding, the run-length coded table description of
//! dynamic blocks, and writes whichever block the strategy selects.

use crate::config::BlockStrategy;
use crate::huffman::{
    CODELEN_ALPHABET_SIZE, CodeTable, DISTANCE_ALPHABET_SIZE, END_OF_BLOCK, LITLEN_ALPHABET_SIZE,
    MAX_CODE_LENGTH, MAX_CODELEN_CODE_LENGTH,
};
use crate::lz77::Token;
use crate::tables::{CODE_LENGTH_ORDER, fixed_distance_codes, fixed_litlen_codes, map_distance, map_length};
use log::{debug, trace};
use oxiflate_core::bitstream::BitWriter;
use oxiflate_core::error::{FlateError, Result};
use std::io::Write;

/// Largest payload of one stored block.
pub const MAX_STORED_LEN: usize = 65535;

/// Code-length symbol: repeat the previous length 3-6 times.
pub const REPEAT_PREVIOUS: u8 = 16;
/// Code-length symbol: repeat zero 3-10 times.
pub const REPEAT_ZERO_SHORT: u8 = 17;
/// Code-length symbol: repeat zero 11-138 times.
pub const REPEAT_ZERO_LONG: u8 = 18;

/// Block type, as carried in the 2-bit BTYPE field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    /// `00`: uncompressed.
    Stored = 0,
    /// `01`: fixed Huffman code.
    Fixed = 1,
    /// `10`: dynamic Huffman code.
    Dynamic = 2,
}

impl BlockType {
    /// Parse a BTYPE field. `11` is reserved and rejected.
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            0 => Ok(Self::Stored),
            1 => Ok(Self::Fixed),
            2 => Ok(Self::Dynamic),
            other => Err(FlateError::invalid_block_type(other as u8)),
        }
    }

    /// BTYPE field value.
    pub fn bits(self) -> u32 {
        self as u32
    }
}

/// Block counts by type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    /// Stored blocks, counting each piece of a split run.
    pub stored_blocks: u64,
    /// Fixed Huffman blocks.
    pub fixed_blocks: u64,
    /// Dynamic Huffman blocks.
    pub dynamic_blocks: u64,
}

impl BlockStats {
    pub(crate) fn record(&mut self, kind: BlockType) {
        self.record_many(kind, 1);
    }

    pub(crate) fn record_many(&mut self, kind: BlockType, count: u64) {
        match kind {
            BlockType::Stored => self.stored_blocks += count,
            BlockType::Fixed => self.fixed_blocks += count,
            BlockType::Dynamic => self.dynamic_blocks += count,
        }
    }

    /// Total blocks of all types.
    pub fn total_blocks(&self) -> u64 {
        self.stored_blocks + self.fixed_blocks + self.dynamic_blocks
    }
}

/// Per-block symbol frequencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    /// Literal/length symbol counts, end-of-block included.
    pub litlen: [u32; LITLEN_ALPHABET_SIZE],
    /// Distance symbol counts.
    pub distance: [u32; DISTANCE_ALPHABET_SIZE],
    /// Total extra bits carried by the block's matches.
    pub extra_bits: u64,
}

impl Histogram {
    /// Count the symbols of `tokens`, plus one end-of-block.
    pub fn from_tokens(tokens: &[Token]) -> Result<Self> {
        let mut histogram = Self {
            litlen: [0; LITLEN_ALPHABET_SIZE],
            distance: [0; DISTANCE_ALPHABET_SIZE],
            extra_bits: 0,
        };

        for token in tokens {
            match *token {
                Token::Literal(byte) => histogram.litlen[usize::from(byte)] += 1,
                Token::Match { distance, length } => {
                    let (len_symbol, len_bits, _) = map_length(length)?;
                    let (dist_symbol, dist_bits, _) = map_distance(distance)?;
                    histogram.litlen[usize::from(len_symbol)] += 1;
                    histogram.distance[usize::from(dist_symbol)] += 1;
                    histogram.extra_bits += u64::from(len_bits) + u64::from(dist_bits);
                }
            }
        }
        histogram.litlen[usize::from(END_OF_BLOCK)] += 1;

        Ok(histogram)
    }
}

/// Give a histogram at least two used symbols.
///
/// A lone code would be incomplete, which strict decoders reject, so the
/// lowest unused symbols are counted once.
fn pad_to_two_symbols(freqs: &mut [u32]) {
    let mut used = freqs.iter().filter(|&&f| f > 0).count();
    for freq in freqs.iter_mut() {
        if used >= 2 {
            break;
        }
        if *freq == 0 {
            *freq = 1;
            used += 1;
        }
    }
}

/// One entry of the run-length coded code-length list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLengthSymbol {
    /// Code-length alphabet symbol (0-18).
    pub symbol: u8,
    /// Extra bits value (repeat count minus the symbol's minimum).
    pub extra: u8,
    /// Number of extra bits: 2, 3 or 7 for symbols 16-18, else 0.
    pub extra_bits: u8,
}

impl CodeLengthSymbol {
    fn literal(length: u8) -> Self {
        Self {
            symbol: length,
            extra: 0,
            extra_bits: 0,
        }
    }

    fn repeat(symbol: u8, count: usize) -> Self {
        let (min, extra_bits) = match symbol {
            REPEAT_PREVIOUS => (3, 2),
            REPEAT_ZERO_SHORT => (3, 3),
            _ => (11, 7),
        };
        Self {
            symbol,
            extra: (count - min) as u8,
            extra_bits,
        }
    }
}

/// Run-length encode a code-length list with symbols 16, 17 and 18.
///
/// Zero runs use 18 for chunks of 11-138 and 17 for a remaining 3-10;
/// shorter leftovers are sent as literal zeros. Runs of a non-zero length
/// send the length once, then 16 for chunks of 3-6 repeats.
pub fn encode_code_lengths(lengths: &[u8]) -> Vec<CodeLengthSymbol> {
    let mut symbols = Vec::new();
    let mut i = 0;

    while i < lengths.len() {
        let length = lengths[i];
        let run = lengths[i..].iter().take_while(|&&l| l == length).count();
        let mut remaining = run;

        if length == 0 {
            while remaining >= 11 {
                let take = remaining.min(138);
                symbols.push(CodeLengthSymbol::repeat(REPEAT_ZERO_LONG, take));
                remaining -= take;
            }
            if remaining >= 3 {
                symbols.push(CodeLengthSymbol::repeat(REPEAT_ZERO_SHORT, remaining));
                remaining = 0;
            }
        } else {
            symbols.push(CodeLengthSymbol::literal(length));
            remaining -= 1;
            while remaining >= 3 {
                let take = remaining.min(6);
                symbols.push(CodeLengthSymbol::repeat(REPEAT_PREVIOUS, take));
                remaining -= take;
            }
        }
        symbols.extend((0..remaining).map(|_| CodeLengthSymbol::literal(length)));

        i += run;
    }

    symbols
}

/// Everything a dynamic block sends before its first token.
#[derive(Debug, Clone)]
pub struct DynamicHeader {
    /// Number of literal/length lengths sent (257-286).
    pub hlit: usize,
    /// Number of distance lengths sent (1-30).
    pub hdist: usize,
    /// Number of code-length code lengths sent (4-19).
    pub hclen: usize,
    /// Run-length coded literal/length and distance lengths.
    pub symbols: Vec<CodeLengthSymbol>,
    /// Code for the code-length alphabet.
    pub codelen_table: CodeTable,
}

impl DynamicHeader {
    /// Describe the two tables of a dynamic block.
    pub fn new(litlen: &CodeTable, distance: &CodeTable) -> Self {
        let litlen_lengths = litlen.lengths();
        let distance_lengths = distance.lengths();

        let hlit = last_used(&litlen_lengths).max(257);
        let hdist = last_used(&distance_lengths).max(1);

        let mut all = Vec::with_capacity(hlit + hdist);
        all.extend_from_slice(&litlen_lengths[..hlit]);
        all.extend_from_slice(&distance_lengths[..hdist]);
        let symbols = encode_code_lengths(&all);

        let mut freqs = [0u32; CODELEN_ALPHABET_SIZE];
        for s in &symbols {
            freqs[usize::from(s.symbol)] += 1;
        }
        pad_to_two_symbols(&mut freqs);
        let codelen_table = CodeTable::from_frequencies(&freqs, MAX_CODELEN_CODE_LENGTH);

        let codelen_lengths = codelen_table.lengths();
        let hclen = CODE_LENGTH_ORDER
            .iter()
            .rposition(|&s| codelen_lengths[s] > 0)
            .map_or(0, |p| p + 1)
            .max(4);

        Self {
            hlit,
            hdist,
            hclen,
            symbols,
            codelen_table,
        }
    }

    /// Header size in bits, BFINAL/BTYPE excluded.
    pub fn cost(&self) -> u64 {
        let lists: u64 = self
            .symbols
            .iter()
            .map(|s| {
                let len = self
                    .codelen_table
                    .code(u16::from(s.symbol))
                    .map_or(0, |c| c.length);
                u64::from(len) + u64::from(s.extra_bits)
            })
            .sum();
        5 + 5 + 4 + 3 * self.hclen as u64 + lists
    }

    /// Serialize the header, BFINAL/BTYPE excluded.
    pub fn write<W: Write>(&self, writer: &mut BitWriter<W>) -> Result<()> {
        trace!(
            "dynamic header: hlit={} hdist={} hclen={}",
            self.hlit, self.hdist, self.hclen
        );

        writer.write_bits((self.hlit - 257) as u32, 5)?;
        writer.write_bits((self.hdist - 1) as u32, 5)?;
        writer.write_bits((self.hclen - 4) as u32, 4)?;

        let codelen_lengths = self.codelen_table.lengths();
        for &symbol in &CODE_LENGTH_ORDER[..self.hclen] {
            writer.write_bits(u32::from(codelen_lengths[symbol]), 3)?;
        }

        for s in &self.symbols {
            self.codelen_table.write_symbol(writer, u16::from(s.symbol))?;
            writer.write_bits(u32::from(s.extra), s.extra_bits)?;
        }
        Ok(())
    }
}

/// Index one past the last non-zero length.
fn last_used(lengths: &[u8]) -> usize {
    lengths.iter().rposition(|&l| l > 0).map_or(0, |p| p + 1)
}

/// Bits needed to send `len` raw bytes as stored blocks, starting with
/// `pending_bits` bits already in the current byte.
pub fn stored_cost(len: usize, pending_bits: u8) -> u64 {
    let blocks = len.div_ceil(MAX_STORED_LEN).max(1) as u64;
    // First header pads from wherever the stream is; later ones start aligned.
    let first_pad = (8 - (u64::from(pending_bits) + 3) % 8) % 8;
    let first = 3 + first_pad + 32;
    let rest = (blocks - 1) * (3 + 5 + 32);
    first + rest + 8 * len as u64
}

/// Bit costs of the three encodings of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCosts {
    /// Stored blocks, including alignment padding.
    pub stored: u64,
    /// Fixed Huffman block.
    pub fixed: u64,
    /// Dynamic Huffman block, header included.
    pub dynamic: u64,
}

/// Write one block of `tokens`; `raw` is the input those tokens cover.
///
/// Returns the block type that was written. With
/// [`BlockStrategy::Auto`], fixed wins whenever it is no larger than
/// dynamic, and stored wins only when strictly smaller than both. Stored
/// output longer than 65535 bytes is split; only the last piece carries
/// the final flag.
pub fn write_block<W: Write>(
    writer: &mut BitWriter<W>,
    tokens: &[Token],
    raw: &[u8],
    strategy: BlockStrategy,
    is_final: bool,
) -> Result<BlockType> {
    if strategy == BlockStrategy::Stored {
        write_stored(writer, raw, is_final)?;
        debug!("block: stored, final={} bytes={}", is_final, raw.len());
        return Ok(BlockType::Stored);
    }

    let histogram = Histogram::from_tokens(tokens)?;
    let fixed_cost = 3
        + fixed_litlen_codes().cost(&histogram.litlen)
        + fixed_distance_codes().cost(&histogram.distance)
        + histogram.extra_bits;

    if strategy == BlockStrategy::Fixed {
        write_fixed(writer, tokens, is_final)?;
        debug!("block: fixed, final={} tokens={} bits={}", is_final, tokens.len(), fixed_cost);
        return Ok(BlockType::Fixed);
    }

    let mut litlen_freqs = histogram.litlen;
    let mut distance_freqs = histogram.distance;
    pad_to_two_symbols(&mut litlen_freqs);
    pad_to_two_symbols(&mut distance_freqs);
    let litlen = CodeTable::from_frequencies(&litlen_freqs, MAX_CODE_LENGTH);
    let distance = CodeTable::from_frequencies(&distance_freqs, MAX_CODE_LENGTH);
    let header = DynamicHeader::new(&litlen, &distance);

    let costs = BlockCosts {
        stored: stored_cost(raw.len(), writer.pending_bits()),
        fixed: fixed_cost,
        dynamic: 3
            + header.cost()
            + litlen.cost(&histogram.litlen)
            + distance.cost(&histogram.distance)
            + histogram.extra_bits,
    };

    let chosen = match strategy {
        BlockStrategy::Dynamic => BlockType::Dynamic,
        _ if costs.stored < costs.fixed.min(costs.dynamic) => BlockType::Stored,
        _ if costs.fixed <= costs.dynamic => BlockType::Fixed,
        _ => BlockType::Dynamic,
    };

    debug!(
        "block: {:?}, final={} tokens={} bytes={} costs={:?}",
        chosen,
        is_final,
        tokens.len(),
        raw.len(),
        costs
    );

    match chosen {
        BlockType::Stored => write_stored(writer, raw, is_final)?,
        BlockType::Fixed => write_fixed(writer, tokens, is_final)?,
        BlockType::Dynamic => {
            writer.write_bit(is_final)?;
            writer.write_bits(BlockType::Dynamic.bits(), 2)?;
            header.write(writer)?;
            write_tokens(writer, tokens, &litlen, &distance)?;
        }
    }
    Ok(chosen)
}

/// Write `data` as one or more stored blocks (one empty block if `data`
/// is empty).
pub fn write_stored<W: Write>(writer: &mut BitWriter<W>, data: &[u8], is_final: bool) -> Result<()> {
    let mut chunks = data.chunks(MAX_STORED_LEN).peekable();
    if chunks.peek().is_none() {
        return write_stored_chunk(writer, &[], is_final);
    }
    while let Some(chunk) = chunks.next() {
        let last = chunks.peek().is_none();
        write_stored_chunk(writer, chunk, is_final && last)?;
    }
    Ok(())
}

fn write_stored_chunk<W: Write>(writer: &mut BitWriter<W>, chunk: &[u8], is_final: bool) -> Result<()> {
    writer.write_bit(is_final)?;
    writer.write_bits(BlockType::Stored.bits(), 2)?;
    writer.byte_align()?;
    let len = chunk.len() as u16;
    writer.write_bits(u32::from(len), 16)?;
    writer.write_bits(u32::from(!len), 16)?;
    writer.write_bytes(chunk)
}

/// Write a fixed Huffman block.
pub fn write_fixed<W: Write>(writer: &mut BitWriter<W>, tokens: &[Token], is_final: bool) -> Result<()> {
    writer.write_bit(is_final)?;
    writer.write_bits(BlockType::Fixed.bits(), 2)?;
    write_tokens(writer, tokens, fixed_litlen_codes(), fixed_distance_codes())
}

/// Write coded tokens followed by end-of-block.
pub fn write_tokens<W: Write>(
    writer: &mut BitWriter<W>,
    tokens: &[Token],
    litlen: &CodeTable,
    distance: &CodeTable,
) -> Result<()> {
    for token in tokens {
        match *token {
            Token::Literal(byte) => litlen.write_symbol(writer, u16::from(byte))?,
            Token::Match {
                distance: dist,
                length,
            } => {
                let (symbol, bits, extra) = map_length(length)?;
                litlen.write_symbol(writer, symbol)?;
                writer.write_bits(u32::from(extra), bits)?;

                let (symbol, bits, extra) = map_distance(dist)?;
                distance.write_symbol(writer, symbol)?;
                writer.write_bits(u32::from(extra), bits)?;
            }
        }
    }
    litlen.write_symbol(writer, END_OF_BLOCK)
}
