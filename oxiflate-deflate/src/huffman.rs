//! Canonical Huffman coding for DEFLATE.
//!
//! DEFLATE transmits Huffman codes as code lengths only; the codes
//! themselves follow from a fixed canonical assignment. This module builds
//! depth-limited code lengths from symbol frequencies ([`HuffmanBuilder`]),
//! turns lengths into codes for the encoder ([`CodeTable`]), and rebuilds a
//! decoder from lengths alone ([`DecodeTable`]).
//!
//! # Alphabets
//!
//! - **Literal/Length**: 0-285 (0-255 literals, 256 EOB, 257-285 lengths)
//! - **Distance**: 0-29 (back-reference distances)
//! - **Code Length**: 0-18 (for encoding dynamic Huffman trees)

use oxiflate_core::bitstream::{BitReader, BitWriter, reverse_bits};
use oxiflate_core::error::{FlateError, Result};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::{Read, Write};

/// Maximum code length for the literal/length and distance alphabets.
pub const MAX_CODE_LENGTH: u8 = 15;

/// Maximum code length for the code-length alphabet.
pub const MAX_CODELEN_CODE_LENGTH: u8 = 7;

/// Number of usable literal/length symbols (0-285).
pub const LITLEN_ALPHABET_SIZE: usize = 286;

/// Number of usable distance symbols (0-29).
pub const DISTANCE_ALPHABET_SIZE: usize = 30;

/// Size of the code length alphabet (0-18).
pub const CODELEN_ALPHABET_SIZE: usize = 19;

/// End of block symbol.
pub const END_OF_BLOCK: u16 = 256;

/// A single canonical code: `length` bits of `code`, most significant first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HuffmanCode {
    /// Code value.
    pub code: u16,
    /// Code length in bits; 0 means the symbol has no code.
    pub length: u8,
}

/// Assign canonical codes to a list of code lengths.
///
/// Symbols are ordered by `(length, symbol)`; the running code starts at 0,
/// is shifted left by the length difference whenever the length grows, and
/// is incremented after every assignment. Zero-length symbols get no code.
pub fn canonical_codes(lengths: &[u8]) -> Vec<HuffmanCode> {
    let mut order: Vec<u16> = (0..lengths.len() as u16)
        .filter(|&s| lengths[usize::from(s)] > 0)
        .collect();
    order.sort_by_key(|&s| (lengths[usize::from(s)], s));

    let mut codes = vec![HuffmanCode::default(); lengths.len()];
    let mut code = 0u32;
    let mut prev_length = 0u8;
    for symbol in order {
        let length = lengths[usize::from(symbol)];
        if prev_length != 0 {
            code = (code + 1) << (length - prev_length);
        }
        prev_length = length;
        codes[usize::from(symbol)] = HuffmanCode {
            code: code as u16,
            length,
        };
    }
    codes
}

/// Reject lengths above `max_length` and over-subscribed length sets.
///
/// Incomplete sets are accepted: the format allows them (a block using a
/// single distance code, for instance).
pub fn validate_lengths(lengths: &[u8], max_length: u8) -> Result<()> {
    let mut space = 0u64;
    for &len in lengths {
        if len > max_length {
            return Err(FlateError::invalid_header(format!(
                "Code length {} exceeds maximum {}",
                len, max_length
            )));
        }
        if len > 0 {
            space += 1u64 << (max_length - len);
        }
    }
    if space > 1u64 << max_length {
        return Err(FlateError::invalid_header("Over-subscribed Huffman code"));
    }
    Ok(())
}

/// Encoder-side table: symbol to canonical code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTable {
    codes: Vec<HuffmanCode>,
}

impl CodeTable {
    /// Build from code lengths, validating them against [`MAX_CODE_LENGTH`].
    pub fn from_lengths(lengths: &[u8]) -> Result<Self> {
        validate_lengths(lengths, MAX_CODE_LENGTH)?;
        Ok(Self::canonical(lengths))
    }

    /// Build from frequencies with codes no longer than `max_length`.
    pub fn from_frequencies(freqs: &[u32], max_length: u8) -> Self {
        Self::canonical(&HuffmanBuilder::build_lengths(freqs, max_length))
    }

    /// Build from lengths known to be valid.
    pub(crate) fn canonical(lengths: &[u8]) -> Self {
        Self {
            codes: canonical_codes(lengths),
        }
    }

    /// Number of symbols in the alphabet.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Check if the alphabet is empty.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Code for `symbol`, if it has one.
    pub fn code(&self, symbol: u16) -> Option<HuffmanCode> {
        self.codes
            .get(usize::from(symbol))
            .copied()
            .filter(|c| c.length > 0)
    }

    /// All codes, indexed by symbol.
    pub fn codes(&self) -> &[HuffmanCode] {
        &self.codes
    }

    /// Code length per symbol.
    pub fn lengths(&self) -> Vec<u8> {
        self.codes.iter().map(|c| c.length).collect()
    }

    /// Emit the code for `symbol`, most significant bit first.
    #[inline]
    pub fn write_symbol<W: Write>(&self, writer: &mut BitWriter<W>, symbol: u16) -> Result<()> {
        let code = self
            .code(symbol)
            .ok_or_else(|| FlateError::uncoded_symbol(symbol))?;
        writer.write_bits_msb(u32::from(code.code), code.length)
    }

    /// Total bits needed to code a histogram with this table.
    ///
    /// Symbols outside the table or without a code are ignored.
    pub fn cost(&self, freqs: &[u32]) -> u64 {
        self.codes
            .iter()
            .zip(freqs)
            .map(|(c, &f)| u64::from(c.length) * u64::from(f))
            .sum()
    }
}

/// Node of the merge tree. Children are arena indices.
#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf { symbol: u16, freq: u64 },
    Internal { left: usize, right: usize, freq: u64 },
}

impl Node {
    fn freq(&self) -> u64 {
        match *self {
            Node::Leaf { freq, .. } | Node::Internal { freq, .. } => freq,
        }
    }
}

/// Frequency-driven code length builder.
///
/// Symbols are merged bottom-up into a binary tree, two lowest weights at
/// a time. Equal weights are resolved by node creation order, which makes
/// the result independent of heap internals.
#[derive(Debug, Clone)]
pub struct HuffmanBuilder {
    freqs: Vec<u32>,
}

impl HuffmanBuilder {
    /// Create a builder for an alphabet of `num_symbols` symbols.
    pub fn new(num_symbols: usize) -> Self {
        Self {
            freqs: vec![0; num_symbols],
        }
    }

    /// Count one occurrence of `symbol`.
    ///
    /// # Panics
    ///
    /// Panics if `symbol` is outside the alphabet given to
    /// [`HuffmanBuilder::new`].
    #[inline]
    pub fn add(&mut self, symbol: u16) {
        self.add_count(symbol, 1);
    }

    /// Count `count` occurrences of `symbol`.
    ///
    /// # Panics
    ///
    /// Panics if `symbol` is outside the alphabet; see
    /// [`HuffmanBuilder::try_add_count`] for a checked version.
    pub fn add_count(&mut self, symbol: u16, count: u32) {
        let size = self.freqs.len();
        assert!(
            usize::from(symbol) < size,
            "symbol {symbol} outside alphabet of {size}"
        );
        self.freqs[usize::from(symbol)] += count;
    }

    /// Count `count` occurrences of `symbol`, rejecting symbols outside
    /// the alphabet with [`FlateError::OutOfRange`].
    pub fn try_add_count(&mut self, symbol: u16, count: u32) -> Result<()> {
        let Some(freq) = self.freqs.get_mut(usize::from(symbol)) else {
            let max = self.freqs.len().saturating_sub(1) as u32;
            return Err(FlateError::out_of_range("symbol", u32::from(symbol), 0, max));
        };
        *freq += count;
        Ok(())
    }

    /// Frequencies collected so far.
    pub fn frequencies(&self) -> &[u32] {
        &self.freqs
    }

    /// Build a canonical code table from the collected frequencies.
    pub fn build(&self, max_length: u8) -> CodeTable {
        CodeTable::from_frequencies(&self.freqs, max_length)
    }

    /// Compute code lengths for `freqs`, none longer than `max_length`.
    ///
    /// Zero-frequency symbols get length 0. A lone symbol gets length 1.
    /// With two or more symbols the result is a complete prefix code.
    pub fn build_lengths(freqs: &[u32], max_length: u8) -> Vec<u8> {
        let mut lengths = vec![0u8; freqs.len()];

        let mut arena: Vec<Node> = freqs
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f > 0)
            .map(|(s, &f)| Node::Leaf {
                symbol: s as u16,
                freq: u64::from(f),
            })
            .collect();

        match arena.len() {
            0 => return lengths,
            1 => {
                if let Node::Leaf { symbol, .. } = arena[0] {
                    lengths[usize::from(symbol)] = 1;
                }
                return lengths;
            }
            _ => {}
        }

        let mut heap: BinaryHeap<Reverse<(u64, usize)>> = arena
            .iter()
            .enumerate()
            .map(|(i, n)| Reverse((n.freq(), i)))
            .collect();

        while heap.len() > 1 {
            let (Some(Reverse((fa, a))), Some(Reverse((fb, b)))) = (heap.pop(), heap.pop()) else {
                break;
            };
            let merged = Node::Internal {
                left: a,
                right: b,
                freq: fa + fb,
            };
            arena.push(merged);
            heap.push(Reverse((fa + fb, arena.len() - 1)));
        }

        // Depth-first walk from the root, which is the last node created.
        let mut depth_of_leaf: Vec<(u16, u64, u32)> = Vec::new();
        let mut stack = vec![(arena.len() - 1, 0u32)];
        while let Some((index, depth)) = stack.pop() {
            match arena[index] {
                Node::Leaf { symbol, freq } => depth_of_leaf.push((symbol, freq, depth)),
                Node::Internal { left, right, .. } => {
                    stack.push((left, depth + 1));
                    stack.push((right, depth + 1));
                }
            }
        }

        let deepest = depth_of_leaf.iter().map(|l| l.2).max().unwrap_or(0) as usize;
        let mut bl_count = vec![0u32; deepest + 1];
        for &(_, _, depth) in &depth_of_leaf {
            bl_count[depth as usize] += 1;
        }
        let bl_count = limit_lengths(&bl_count, max_length);

        // Shortest codes go to the most frequent symbols.
        depth_of_leaf.sort_by_key(|&(symbol, freq, depth)| (Reverse(freq), depth, symbol));
        let mut leaves = depth_of_leaf.iter();
        for (len, &count) in bl_count.iter().enumerate().skip(1) {
            for _ in 0..count {
                if let Some(&(symbol, _, _)) = leaves.next() {
                    lengths[usize::from(symbol)] = len as u8;
                }
            }
        }

        lengths
    }
}

/// Rebalance a per-length leaf count so no leaf is deeper than `max_length`.
///
/// Leaves deeper than the limit are first pulled up to it, which
/// over-subscribes the code. Then, until the Kraft sum is exact, one leaf
/// at the limit is detached and re-hung beside the deepest shallower leaf
/// (that leaf becomes an internal node with two children one level down).
/// Each step lowers the sum by exactly one unit.
fn limit_lengths(bl_count: &[u32], max_length: u8) -> Vec<u32> {
    let max = usize::from(max_length);
    let mut counts = vec![0u32; max + 1];
    for (depth, &count) in bl_count.iter().enumerate().skip(1) {
        counts[depth.min(max)] += count;
    }

    let target = 1u64 << max;
    let mut total: u64 = counts
        .iter()
        .enumerate()
        .skip(1)
        .map(|(depth, &count)| u64::from(count) << (max - depth))
        .sum();

    while total > target {
        let Some(depth) = (1..max).rev().find(|&d| counts[d] > 0) else {
            break;
        };
        counts[max] -= 1;
        counts[depth] -= 1;
        counts[depth + 1] += 2;
        total -= 1;
    }

    counts
}

/// Decoder-side table rebuilt from code lengths.
///
/// Codes up to [`DecodeTable::FAST_BITS`] long are resolved with one table
/// lookup. Longer codes, and lookups near the end of input, fall back to a
/// bit-at-a-time canonical walk over increasing lengths.
#[derive(Debug, Clone)]
pub struct DecodeTable {
    /// Indexed by the next `FAST_BITS` stream bits: `(symbol, length)`,
    /// length 0 meaning "use the slow path".
    fast: Vec<(u16, u8)>,
    /// Number of codes of each length.
    counts: [u16; MAX_CODE_LENGTH as usize + 1],
    /// Symbols ordered by `(length, symbol)`.
    symbols: Vec<u16>,
    /// Encoder view of the same code, kept for inspection.
    codes: CodeTable,
}

impl DecodeTable {
    /// Number of bits resolved by the direct lookup table.
    pub const FAST_BITS: u8 = 9;

    /// Build a decoder from code lengths.
    ///
    /// Fails on lengths above 15 and on over-subscribed length sets.
    pub fn from_lengths(lengths: &[u8]) -> Result<Self> {
        validate_lengths(lengths, MAX_CODE_LENGTH)?;
        Ok(Self::build(lengths))
    }

    /// Build from lengths known to be valid.
    pub(crate) fn build(lengths: &[u8]) -> Self {
        let codes = CodeTable::canonical(lengths);

        let mut counts = [0u16; MAX_CODE_LENGTH as usize + 1];
        for &len in lengths {
            counts[usize::from(len)] += 1;
        }
        counts[0] = 0;

        let mut symbols: Vec<u16> = (0..lengths.len() as u16)
            .filter(|&s| lengths[usize::from(s)] > 0)
            .collect();
        symbols.sort_by_key(|&s| (lengths[usize::from(s)], s));

        let size = 1usize << Self::FAST_BITS;
        let mut fast = vec![(0u16, 0u8); size];
        for (symbol, code) in codes.codes().iter().enumerate() {
            if code.length == 0 || code.length > Self::FAST_BITS {
                continue;
            }
            let reversed = reverse_bits(u32::from(code.code), code.length) as usize;
            let step = 1usize << code.length;
            for index in (reversed..size).step_by(step) {
                fast[index] = (symbol as u16, code.length);
            }
        }

        Self {
            fast,
            counts,
            symbols,
            codes,
        }
    }

    /// The canonical codes this table decodes.
    pub fn codes(&self) -> &CodeTable {
        &self.codes
    }

    /// Decode one symbol.
    #[inline]
    pub fn decode_symbol<R: Read>(&self, reader: &mut BitReader<R>) -> Result<u16> {
        let (bits, available) = reader.peek_available(Self::FAST_BITS)?;
        let (symbol, length) = self.fast[bits as usize];
        if length > 0 && length <= available {
            reader.skip_bits(length)?;
            return Ok(symbol);
        }
        self.decode_bitwise(reader)
    }

    /// Decode one symbol reading a single bit at a time.
    ///
    /// The candidate code grows by one bit per step and is checked against
    /// the codes of that length; running past length 15 without a match is
    /// [`FlateError::InvalidHuffmanCode`].
    pub fn decode_bitwise<R: Read>(&self, reader: &mut BitReader<R>) -> Result<u16> {
        let start = reader.bit_position();
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;

        for len in 1..=usize::from(MAX_CODE_LENGTH) {
            code |= i32::from(reader.read_bit()?);
            let count = i32::from(self.counts[len]);
            if code - first < count {
                return Ok(self.symbols[(index + code - first) as usize]);
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }

        Err(FlateError::invalid_huffman(start))
    }
}
