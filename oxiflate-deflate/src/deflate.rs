//! DEFLATE compression.
//!
//! [`Deflater`] is an incremental compressor: input arrives through
//! [`Deflater::write`], full blocks are emitted as soon as enough tokens
//! are pending, and [`Deflater::finish`] closes the stream with the final
//! block. Compressed bytes accumulate internally until taken with
//! [`Deflater::take_output`].

use crate::block::{BlockStats, BlockType, MAX_STORED_LEN, write_block, write_stored};
use crate::config::DeflateConfig;
use crate::lz77::{MatchFinder, Token};
use log::debug;
use oxiflate_core::bitstream::BitWriter;
use oxiflate_core::crc::Crc32;
use oxiflate_core::error::{FlateError, Result};
use oxiflate_core::traits::{CompressStatus, CompressionLevel, Compressor, FlushMode, Progress};

/// DEFLATE compressor.
#[derive(Debug)]
pub struct Deflater {
    config: DeflateConfig,
    finder: MatchFinder,
    /// Tokens of the block being built.
    tokens: Vec<Token>,
    /// Input not yet written out as part of a block.
    raw: Vec<u8>,
    writer: BitWriter<Vec<u8>>,
    crc: Crc32,
    total_in: u64,
    stats: BlockStats,
    finished: bool,
    progress: Option<Progress>,
}

impl Deflater {
    /// Create a compressor with explicit settings.
    pub fn new(config: DeflateConfig) -> Self {
        Self {
            finder: MatchFinder::new(&config),
            config,
            tokens: Vec::with_capacity(config.block_symbols.min(1 << 16)),
            raw: Vec::new(),
            writer: BitWriter::new(Vec::new()),
            crc: Crc32::new(),
            total_in: 0,
            stats: BlockStats::default(),
            finished: false,
            progress: None,
        }
    }

    /// Create a compressor for a compression level (0-9).
    pub fn with_level(level: u8) -> Self {
        Self::new(DeflateConfig::from_level(level))
    }

    /// Settings in use.
    pub fn config(&self) -> &DeflateConfig {
        &self.config
    }

    /// Report the plaintext bytes accepted so far after every write.
    pub fn set_progress(&mut self, callback: impl FnMut(u64) + Send + 'static) {
        self.progress = Some(Progress::new(callback));
    }

    /// Reset to a fresh stream with the same settings.
    ///
    /// Output not yet taken is discarded; a progress callback is kept.
    pub fn reset(&mut self) {
        self.finder.reset();
        self.tokens.clear();
        self.raw.clear();
        self.writer = BitWriter::new(Vec::new());
        self.crc.reset();
        self.total_in = 0;
        self.stats = BlockStats::default();
        self.finished = false;
    }

    /// Feed input. Complete blocks are written as they fill up.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.finished {
            return Err(FlateError::Finished);
        }

        self.crc.update(data);
        self.total_in += data.len() as u64;
        self.finder.push(data);
        self.raw.extend_from_slice(data);

        loop {
            self.finder
                .advance(&mut self.tokens, self.config.block_symbols, false);
            if self.tokens.len() < self.config.block_symbols {
                break;
            }
            self.emit_block(false)?;
        }

        if let Some(progress) = &mut self.progress {
            progress.report(self.total_in);
        }
        Ok(())
    }

    /// Close the current block and byte-align the output, so everything
    /// written so far can be decoded from [`Deflater::take_output`].
    ///
    /// An empty stored block marks the flush point.
    pub fn sync_flush(&mut self) -> Result<()> {
        if self.finished {
            return Err(FlateError::Finished);
        }

        self.drain_input(false)?;
        write_stored(&mut self.writer, &[], false)?;
        self.stats.record(BlockType::Stored);
        Ok(())
    }

    /// Emit the final block and pad the stream to a byte boundary.
    ///
    /// Calling this again after the stream is finished has no effect.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }

        self.drain_input(true)?;
        self.writer.byte_align()?;
        self.finished = true;

        debug!(
            "deflate finished: in={} out={} blocks={:?}",
            self.total_in,
            self.writer.bits_written() / 8,
            self.stats
        );
        Ok(())
    }

    /// Tokenize everything buffered and write it out in blocks.
    ///
    /// With `last` set, the final block carries BFINAL and is written even
    /// if it holds no tokens.
    fn drain_input(&mut self, last: bool) -> Result<()> {
        loop {
            self.finder
                .advance(&mut self.tokens, self.config.block_symbols, true);
            let done = self.finder.pending() == 0;
            if done && self.tokens.is_empty() && !last {
                return Ok(());
            }
            self.emit_block(done && last)?;
            if done {
                return Ok(());
            }
        }
    }

    fn emit_block(&mut self, is_final: bool) -> Result<()> {
        let covered: usize = self.tokens.iter().map(Token::byte_len).sum();
        let kind = write_block(
            &mut self.writer,
            &self.tokens,
            &self.raw[..covered],
            self.config.strategy,
            is_final,
        )?;
        let pieces = match kind {
            BlockType::Stored => covered.div_ceil(MAX_STORED_LEN).max(1) as u64,
            _ => 1,
        };
        self.stats.record_many(kind, pieces);
        self.raw.drain(..covered);
        self.tokens.clear();
        Ok(())
    }

    /// Take the compressed bytes produced so far.
    ///
    /// Bits of an incomplete trailing byte stay behind until more output
    /// completes it, or until [`Deflater::finish`] pads it.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(self.writer.get_mut())
    }

    /// Compress a complete buffer and return the whole stream.
    pub fn compress_to_vec(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.write(data)?;
        self.finish()?;
        Ok(self.take_output())
    }

    /// CRC-32 of all input consumed so far.
    pub fn crc32(&self) -> u32 {
        self.crc.value()
    }

    /// Number of input bytes consumed so far.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Per-type block counts.
    pub fn stats(&self) -> BlockStats {
        self.stats
    }

    /// Check if the final block has been written.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Default for Deflater {
    fn default() -> Self {
        Self::new(DeflateConfig::default())
    }
}

impl From<CompressionLevel> for Deflater {
    fn from(level: CompressionLevel) -> Self {
        Self::new(DeflateConfig::from(level))
    }
}

impl Compressor for Deflater {
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, CompressStatus)> {
        let mut consumed = 0;
        if !self.finished {
            self.write(input)?;
            consumed = input.len();
            match flush {
                FlushMode::None => {}
                FlushMode::Sync => self.sync_flush()?,
                FlushMode::Finish => self.finish()?,
            }
        } else if !input.is_empty() {
            return Err(FlateError::Finished);
        }

        let pending = self.writer.get_mut();
        let produced = pending.len().min(output.len());
        output[..produced].copy_from_slice(&pending[..produced]);
        pending.drain(..produced);

        let status = if !pending.is_empty() {
            CompressStatus::NeedsOutput
        } else if self.finished {
            CompressStatus::Done
        } else {
            CompressStatus::NeedsInput
        };

        Ok((consumed, produced, status))
    }

    fn reset(&mut self) {
        Deflater::reset(self);
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Compress data using DEFLATE at the given level (0-9).
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    Deflater::with_level(level).compress_to_vec(data)
}

/// Compress data using DEFLATE with explicit settings.
pub fn deflate_with(data: &[u8], config: &DeflateConfig) -> Result<Vec<u8>> {
    Deflater::new(*config).compress_to_vec(data)
}
