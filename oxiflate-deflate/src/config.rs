//! Compressor configuration.

use oxiflate_core::traits::CompressionLevel;

/// Default block size bound, in tokens.
pub const DEFAULT_BLOCK_SYMBOLS: usize = 16384;

/// How the block type is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockStrategy {
    /// Pick the smallest encoding per block: fixed when it is no larger
    /// than dynamic, and stored when raw bytes are cheaper still.
    #[default]
    Auto,
    /// Emit stored (uncompressed) blocks only.
    Stored,
    /// Always use the fixed Huffman code.
    Fixed,
    /// Always use per-block dynamic Huffman codes.
    Dynamic,
}

/// Compressor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeflateConfig {
    /// Block type selection.
    pub strategy: BlockStrategy,
    /// Hash chain entries examined per match search.
    pub max_chain: usize,
    /// Defer a match by one byte when the next position matches longer.
    pub lazy_matching: bool,
    /// Maximum tokens per block.
    pub block_symbols: usize,
}

impl DeflateConfig {
    /// Stored blocks only, no match search.
    pub const STORE: Self = Self {
        strategy: BlockStrategy::Stored,
        max_chain: 0,
        lazy_matching: false,
        block_symbols: DEFAULT_BLOCK_SYMBOLS,
    };

    /// Settings for a compression level (0-9, clamped).
    ///
    /// | Level | Chain depth | Lazy |
    /// |-------|-------------|------|
    /// | 0     | stored      | no   |
    /// | 1     | 4           | no   |
    /// | 2     | 8           | no   |
    /// | 3     | 16          | no   |
    /// | 4     | 32          | yes  |
    /// | 5     | 48          | yes  |
    /// | 6     | 64          | yes  |
    /// | 7     | 128         | yes  |
    /// | 8     | 512         | yes  |
    /// | 9     | 4096        | yes  |
    pub fn from_level(level: u8) -> Self {
        let (max_chain, lazy_matching) = match level.min(9) {
            0 => return Self::STORE,
            1 => (4, false),
            2 => (8, false),
            3 => (16, false),
            4 => (32, true),
            5 => (48, true),
            6 => (64, true),
            7 => (128, true),
            8 => (512, true),
            _ => (4096, true),
        };

        Self {
            strategy: BlockStrategy::Auto,
            max_chain,
            lazy_matching,
            block_symbols: DEFAULT_BLOCK_SYMBOLS,
        }
    }

    /// Set the block strategy.
    pub fn with_strategy(mut self, strategy: BlockStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the hash chain depth.
    pub fn with_max_chain(mut self, max_chain: usize) -> Self {
        self.max_chain = max_chain;
        self
    }

    /// Enable or disable lazy matching.
    pub fn with_lazy_matching(mut self, lazy: bool) -> Self {
        self.lazy_matching = lazy;
        self
    }

    /// Set the block size bound (at least one token).
    pub fn with_block_symbols(mut self, block_symbols: usize) -> Self {
        self.block_symbols = block_symbols.max(1);
        self
    }
}

impl Default for DeflateConfig {
    fn default() -> Self {
        Self::from_level(CompressionLevel::DEFAULT.level())
    }
}

impl From<CompressionLevel> for DeflateConfig {
    fn from(level: CompressionLevel) -> Self {
        Self::from_level(level.level())
    }
}
