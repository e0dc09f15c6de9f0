//! LZ77 match finding for DEFLATE.
//!
//! [`MatchFinder`] turns a byte stream into [`Token`]s: literals, and
//! `(distance, length)` back-references into the previous 32 KiB.
//!
//! # Algorithm
//!
//! Every position is indexed by a hash of its next three bytes. `head`
//! holds the most recent position per hash and `prev` links each position
//! to the previous one with the same hash, indexed modulo the window size.
//! A search walks that chain newest-first for at most `max_chain` entries,
//! keeping the longest match; since the walk goes from near to far, ties
//! resolve to the smallest distance.
//!
//! Positions are absolute stream offsets, so input can arrive in chunks
//! and the chains stay valid while the byte buffer slides. Entries older
//! than the window are never cleaned up: the walk stops at the first one
//! that is too far back, and `prev` slots are overwritten as the window
//! advances.

use crate::config::DeflateConfig;
use crate::tables::{MAX_DISTANCE, MAX_MATCH, MIN_MATCH};

/// Maximum back-reference distance, as a buffer size.
pub const WINDOW_SIZE: usize = MAX_DISTANCE as usize;

const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// Number of hash buckets (power of 2).
const HASH_BITS: u32 = 15;
const HASH_SIZE: usize = 1 << HASH_BITS;
const HASH_MASK: usize = HASH_SIZE - 1;

/// Empty chain link.
const NIL: usize = usize::MAX;

/// Lookahead kept unprocessed until more input or a flush arrives, so a
/// match (and a one-step lazy lookahead) is never cut short by a chunk boundary.
const LOOKAHEAD: usize = MAX_MATCH as usize + 1;

/// A token produced by the match finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A literal byte.
    Literal(u8),
    /// A back-reference to previously seen data.
    Match {
        /// Distance back into the window (1-32768).
        distance: u16,
        /// Number of bytes to copy (3-258).
        length: u16,
    },
}

impl Token {
    /// Number of input bytes this token stands for.
    #[inline]
    pub fn byte_len(&self) -> usize {
        match *self {
            Token::Literal(_) => 1,
            Token::Match { length, .. } => usize::from(length),
        }
    }
}

/// Hash-chained sliding-window match finder.
#[derive(Debug, Clone)]
pub struct MatchFinder {
    /// History plus not-yet-tokenized input.
    window: Vec<u8>,
    /// Absolute position of `window[0]`.
    base: usize,
    /// Most recent position per hash bucket.
    head: Vec<usize>,
    /// Previous position with the same hash, indexed by `pos & WINDOW_MASK`.
    prev: Vec<usize>,
    /// Positions below this are in the hash chains.
    hashed: usize,
    /// Next position to tokenize.
    pos: usize,
    /// Chain entries examined per search.
    max_chain: usize,
    /// One-step lazy evaluation.
    lazy: bool,
    /// Match found by a lazy lookahead, valid for `pos`.
    deferred: Option<(u16, u16)>,
}

impl MatchFinder {
    /// Create a match finder with the search settings of `config`.
    pub fn new(config: &DeflateConfig) -> Self {
        Self {
            window: Vec::with_capacity(WINDOW_SIZE * 2),
            base: 0,
            head: vec![NIL; HASH_SIZE],
            prev: vec![NIL; WINDOW_SIZE],
            hashed: 0,
            pos: 0,
            max_chain: config.max_chain,
            lazy: config.lazy_matching,
            deferred: None,
        }
    }

    /// Create a match finder for a compression level (0-9).
    pub fn with_level(level: u8) -> Self {
        Self::new(&DeflateConfig::from_level(level))
    }

    /// Forget all input and history.
    pub fn reset(&mut self) {
        self.window.clear();
        self.base = 0;
        self.head.fill(NIL);
        self.prev.fill(NIL);
        self.hashed = 0;
        self.pos = 0;
        self.deferred = None;
    }

    /// Total bytes pushed so far.
    pub fn total_in(&self) -> usize {
        self.base + self.window.len()
    }

    /// Bytes pushed but not yet covered by a token.
    pub fn pending(&self) -> usize {
        self.total_in() - self.pos
    }

    /// Append input.
    pub fn push(&mut self, data: &[u8]) {
        self.slide();
        self.window.extend_from_slice(data);
    }

    /// Drop history that can no longer be referenced.
    fn slide(&mut self) {
        let keep_from = self.pos.saturating_sub(WINDOW_SIZE);
        let drop = keep_from - self.base;
        // Amortize: only shift once a full window's worth is dead.
        if drop >= WINDOW_SIZE {
            self.window.drain(..drop);
            self.base += drop;
        }
    }

    #[inline]
    fn byte(&self, pos: usize) -> u8 {
        self.window[pos - self.base]
    }

    /// Three-byte hash, equal to the rolling `h = (h << 5) ^ byte` over
    /// the three bytes, masked to 15 bits.
    #[inline]
    fn hash(&self, pos: usize) -> usize {
        let i = pos - self.base;
        ((usize::from(self.window[i]) << 10)
            ^ (usize::from(self.window[i + 1]) << 5)
            ^ usize::from(self.window[i + 2]))
            & HASH_MASK
    }

    /// Insert every position below `upto` that has three bytes available.
    fn insert_upto(&mut self, upto: usize) {
        let end = upto.min(self.total_in().saturating_sub(2));
        while self.hashed < end {
            let pos = self.hashed;
            let h = self.hash(pos);
            self.prev[pos & WINDOW_MASK] = self.head[h];
            self.head[h] = pos;
            self.hashed += 1;
        }
    }

    /// Longest match for `pos` as `(distance, length)`.
    ///
    /// Every position below `pos` must already be hashed.
    fn find_match(&self, pos: usize) -> Option<(u16, u16)> {
        let end = self.total_in();
        let max_len = (end - pos).min(usize::from(MAX_MATCH));
        if max_len < usize::from(MIN_MATCH) || self.max_chain == 0 {
            return None;
        }

        let mut best_len = usize::from(MIN_MATCH) - 1;
        let mut best_dist = 0usize;
        let mut candidate = self.head[self.hash(pos)];
        let mut chain = 0;

        let current = &self.window[pos - self.base..pos - self.base + max_len];

        while candidate != NIL && candidate < pos && chain < self.max_chain {
            let distance = pos - candidate;
            if distance > WINDOW_SIZE {
                break;
            }

            let start = candidate - self.base;
            // Quick reject on the byte that would extend the best match.
            if self.window[start + best_len] == current[best_len] {
                let len = current
                    .iter()
                    .zip(&self.window[start..])
                    .take_while(|(a, b)| a == b)
                    .count();
                if len > best_len {
                    best_len = len;
                    best_dist = distance;
                    if len == max_len {
                        break;
                    }
                }
            }

            let next = self.prev[candidate & WINDOW_MASK];
            if next == NIL || next >= candidate {
                break;
            }
            candidate = next;
            chain += 1;
        }

        (best_len >= usize::from(MIN_MATCH)).then_some((best_dist as u16, best_len as u16))
    }

    /// Tokenize buffered input, appending to `tokens`.
    ///
    /// Stops once `tokens.len()` reaches `max_tokens`. Unless `flush` is set,
    /// the last [`MAX_MATCH`] + 1 bytes stay buffered so matches can extend
    /// into input that has not arrived yet.
    pub fn advance(&mut self, tokens: &mut Vec<Token>, max_tokens: usize, flush: bool) {
        let end = self.total_in();
        let limit = if flush {
            end
        } else {
            end.saturating_sub(LOOKAHEAD)
        };

        while self.pos < limit && tokens.len() < max_tokens {
            let pos = self.pos;
            self.insert_upto(pos);
            let found = self.deferred.take().or_else(|| self.find_match(pos));

            let Some((distance, length)) = found else {
                tokens.push(Token::Literal(self.byte(pos)));
                self.pos += 1;
                continue;
            };

            if self.lazy && length < MAX_MATCH && pos + 1 < limit {
                self.insert_upto(pos + 1);
                if let Some(next) = self.find_match(pos + 1) {
                    if next.1 > length {
                        tokens.push(Token::Literal(self.byte(pos)));
                        self.deferred = Some(next);
                        self.pos += 1;
                        continue;
                    }
                }
            }

            tokens.push(Token::Match { distance, length });
            self.pos += usize::from(length);
        }

        // Keep the skipped positions of the last match searchable.
        self.insert_upto(self.pos);
    }

    /// Tokenize a complete buffer.
    pub fn compress_all(input: &[u8], level: u8) -> Vec<Token> {
        let mut finder = Self::with_level(level);
        finder.push(input);
        let mut tokens = Vec::with_capacity(input.len() / 2);
        finder.advance(&mut tokens, usize::MAX, true);
        tokens
    }
}

impl Default for MatchFinder {
    fn default() -> Self {
        Self::new(&DeflateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(tokens: &[Token]) -> Vec<u8> {
        let mut output = Vec::new();
        for token in tokens {
            match *token {
                Token::Literal(b) => output.push(b),
                Token::Match { distance, length } => {
                    for _ in 0..length {
                        output.push(output[output.len() - usize::from(distance)]);
                    }
                }
            }
        }
        output
    }

    #[test]
    fn test_literals_only() {
        let tokens = MatchFinder::compress_all(b"abcdefgh", 6);
        assert_eq!(tokens.len(), 8);
        assert!(tokens.iter().all(|t| matches!(t, Token::Literal(_))));
    }

    #[test]
    fn test_alternating_pattern() {
        let tokens = MatchFinder::compress_all(b"ababababababab", 6);
        assert_eq!(tokens[0], Token::Literal(b'a'));
        assert_eq!(tokens[1], Token::Literal(b'b'));
        assert_eq!(
            tokens[2],
            Token::Match {
                distance: 2,
                length: 12
            }
        );
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_run_uses_distance_one() {
        let input = vec![b'z'; 500];
        let tokens = MatchFinder::compress_all(&input, 6);
        assert_eq!(tokens[0], Token::Literal(b'z'));
        assert!(matches!(tokens[1], Token::Match { distance: 1, length: 258 }));
        assert_eq!(expand(&tokens), input);
    }

    #[test]
    fn test_prefers_nearest_on_ties() {
        // "abc" occurs at 0 and 4; the match at 8 should use distance 4.
        let tokens = MatchFinder::compress_all(b"abcXabcYabc", 9);
        assert_eq!(
            tokens.last(),
            Some(&Token::Match {
                distance: 4,
                length: 3
            })
        );
    }

    #[test]
    fn test_level_0_emits_literals() {
        let tokens = MatchFinder::compress_all(b"test data test data", 0);
        assert!(tokens.iter().all(|t| matches!(t, Token::Literal(_))));
    }

    #[test]
    fn test_chunked_input_matches_whole() {
        let input: Vec<u8> = b"The quick brown fox jumps over the lazy dog. "
            .iter()
            .cycle()
            .take(20_000)
            .copied()
            .collect();

        let mut finder = MatchFinder::with_level(6);
        let mut tokens = Vec::new();
        for chunk in input.chunks(333) {
            finder.push(chunk);
            finder.advance(&mut tokens, usize::MAX, false);
        }
        finder.advance(&mut tokens, usize::MAX, true);

        assert_eq!(finder.pending(), 0);
        assert_eq!(expand(&tokens), input);
        assert!(tokens.len() < input.len() / 50);
    }

    #[test]
    fn test_max_tokens_bound() {
        let input: Vec<u8> = (0..=255u8).collect();
        let mut finder = MatchFinder::with_level(6);
        finder.push(&input);
        let mut tokens = Vec::new();
        finder.advance(&mut tokens, 100, true);
        assert_eq!(tokens.len(), 100);
        assert_eq!(finder.pending(), 156);
        finder.advance(&mut tokens, usize::MAX, true);
        assert_eq!(expand(&tokens), input);
    }

    #[test]
    fn test_long_input_respects_window() {
        let mut input = Vec::new();
        let mut seed: u32 = 0x1234_5678;
        for _ in 0..100_000 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            // Small alphabet so matches are plentiful at every distance.
            input.push(b'a' + ((seed >> 16) % 4) as u8);
        }

        let mut finder = MatchFinder::with_level(4);
        let mut tokens = Vec::new();
        for chunk in input.chunks(10_000) {
            finder.push(chunk);
            finder.advance(&mut tokens, usize::MAX, false);
        }
        finder.advance(&mut tokens, usize::MAX, true);

        let mut produced = 0usize;
        for token in &tokens {
            if let Token::Match { distance, length } = *token {
                assert!(distance >= 1 && usize::from(distance) <= produced.min(WINDOW_SIZE));
                assert!((MIN_MATCH..=MAX_MATCH).contains(&length));
            }
            produced += token.byte_len();
        }
        assert_eq!(expand(&tokens), input);
    }
}
