//! Symbol tables fixed by the DEFLATE format (RFC 1951).
//!
//! Match lengths and distances are sent as a coarse symbol plus a few
//! "extra bits" giving the offset from that symbol's base value. This
//! module holds the base/extra-bit tables, the lookups in both directions,
//! and the fixed Huffman code used by BTYPE=01 blocks.

use crate::huffman::{CodeTable, DecodeTable};
use oxiflate_core::error::{FlateError, Result};
use std::sync::OnceLock;

/// Shortest encodable match.
pub const MIN_MATCH: u16 = 3;

/// Longest encodable match.
pub const MAX_MATCH: u16 = 258;

/// Farthest encodable back-reference.
pub const MAX_DISTANCE: u16 = 32768;

/// First literal/length symbol that denotes a match length.
pub const FIRST_LENGTH_CODE: u16 = 257;

/// Length code base values, for symbols 257-285.
pub const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115,
    131, 163, 195, 227, 258,
];

/// Extra bits for length symbols 257-285.
pub const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Distance code base values, for symbols 0-29.
pub const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Extra bits for distance symbols 0-29.
pub const DISTANCE_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Transmission order of the code-length alphabet in a dynamic header.
pub const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Fixed literal/length code lengths.
///
/// - Symbols 0-143: 8 bits
/// - Symbols 144-255: 9 bits
/// - Symbols 256-279: 7 bits
/// - Symbols 280-287: 8 bits
///
/// Symbols 286 and 287 take part in the code but never appear in valid data.
pub fn fixed_litlen_lengths() -> [u8; 288] {
    let mut lengths = [8u8; 288];
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths
}

/// Fixed distance code lengths: 5 bits for each of the 32 code slots
/// (30 usable distance symbols plus two reserved ones).
pub fn fixed_distance_lengths() -> [u8; 32] {
    [5u8; 32]
}

/// Fixed literal/length encoder table, built once.
pub fn fixed_litlen_codes() -> &'static CodeTable {
    static TABLE: OnceLock<CodeTable> = OnceLock::new();
    TABLE.get_or_init(|| CodeTable::canonical(&fixed_litlen_lengths()))
}

/// Fixed distance encoder table, built once.
pub fn fixed_distance_codes() -> &'static CodeTable {
    static TABLE: OnceLock<CodeTable> = OnceLock::new();
    TABLE.get_or_init(|| CodeTable::canonical(&fixed_distance_lengths()))
}

/// Fixed literal/length decoder, built once.
pub fn fixed_litlen_decoder() -> &'static DecodeTable {
    static TABLE: OnceLock<DecodeTable> = OnceLock::new();
    TABLE.get_or_init(|| DecodeTable::build(&fixed_litlen_lengths()))
}

/// Fixed distance decoder, built once.
pub fn fixed_distance_decoder() -> &'static DecodeTable {
    static TABLE: OnceLock<DecodeTable> = OnceLock::new();
    TABLE.get_or_init(|| DecodeTable::build(&fixed_distance_lengths()))
}

/// Map a match length (3-258) to `(symbol, extra bit count, extra value)`.
///
/// The symbol is the one with the largest base not above `length`.
pub fn map_length(length: u16) -> Result<(u16, u8, u16)> {
    if !(MIN_MATCH..=MAX_MATCH).contains(&length) {
        return Err(FlateError::out_of_range(
            "length",
            u32::from(length),
            u32::from(MIN_MATCH),
            u32::from(MAX_MATCH),
        ));
    }
    let index = LENGTH_BASE.partition_point(|&base| base <= length) - 1;
    Ok((
        FIRST_LENGTH_CODE + index as u16,
        LENGTH_EXTRA_BITS[index],
        length - LENGTH_BASE[index],
    ))
}

/// Map a distance (1-32768) to `(symbol, extra bit count, extra value)`.
pub fn map_distance(distance: u16) -> Result<(u16, u8, u16)> {
    if !(1..=MAX_DISTANCE).contains(&distance) {
        return Err(FlateError::out_of_range(
            "distance",
            u32::from(distance),
            1,
            u32::from(MAX_DISTANCE),
        ));
    }
    let index = DISTANCE_BASE.partition_point(|&base| base <= distance) - 1;
    Ok((
        index as u16,
        DISTANCE_EXTRA_BITS[index],
        distance - DISTANCE_BASE[index],
    ))
}

/// Base length and extra bit count for a length symbol (257-285).
///
/// Returns `None` for anything else, including the reserved 286 and 287.
pub fn length_base_for(symbol: u16) -> Option<(u16, u8)> {
    let index = usize::from(symbol.checked_sub(FIRST_LENGTH_CODE)?);
    Some((*LENGTH_BASE.get(index)?, LENGTH_EXTRA_BITS[index]))
}

/// Base distance and extra bit count for a distance symbol (0-29).
///
/// Returns `None` for the reserved 30 and 31.
pub fn distance_base_for(symbol: u16) -> Option<(u16, u8)> {
    let index = usize::from(symbol);
    Some((*DISTANCE_BASE.get(index)?, DISTANCE_EXTRA_BITS[index]))
}
