//! Random access into the LZX-compressed content section
//!
//! LZX is a stateful stream: block `b` only decodes correctly after every
//! block since the last reset boundary has been fed through the decoder in
//! order. [`Decompressor`] makes that dependency explicit — it tracks the
//! decoder's position as the index of the last block produced and replays
//! the missing prefix of the reset segment before decoding a requested
//! block, resetting the decoder exactly on reset-aligned blocks.

use crate::cache::{BlockCache, DEFAULT_CACHE_BLOCKS};
use crate::error::{Error, Result};
use crate::header::LzxcResetTable;
use crate::source::{read_exact_at, ByteSource};
use byteorder::{ByteOrder, LittleEndian};
use lzxd::{Lzxd, WindowSize};
use tracing::{debug, trace};

/// Worst-case growth of an LZX block over its decompressed size; compressed
/// blocks claiming more are corrupt.
pub(crate) const LZX_MAX_GROWTH: u64 = 6144;

/// Streaming LZX decoder seam.
pub(crate) trait LzxStream: Send {
    /// Drop all window history, as at a reset boundary.
    fn reset(&mut self);

    /// Decode one block, producing exactly `out_len` bytes.
    fn decode(&mut self, src: &[u8], out_len: usize) -> Result<Vec<u8>>;
}

struct LzxdStream {
    window_bytes: u32,
    inner: Lzxd,
}

impl LzxdStream {
    fn new(window_bytes: u32, window: WindowSize) -> Self {
        Self {
            window_bytes,
            inner: Lzxd::new(window),
        }
    }
}

impl LzxStream for LzxdStream {
    fn reset(&mut self) {
        // The window size mapped when this stream was built, so it maps now
        if let Some(window) = window_for_size(self.window_bytes) {
            self.inner = Lzxd::new(window);
        }
    }

    fn decode(&mut self, src: &[u8], out_len: usize) -> Result<Vec<u8>> {
        self.inner
            .decompress_next(src, out_len)
            .map(<[u8]>::to_vec)
            .map_err(|e| Error::LzxDecode(format!("{e:?}")))
    }
}

/// Map a window size in bytes onto an LZX window tier.
fn window_for_size(bytes: u32) -> Option<WindowSize> {
    match bytes {
        0x0000_8000 => Some(WindowSize::KB32),
        0x0001_0000 => Some(WindowSize::KB64),
        0x0002_0000 => Some(WindowSize::KB128),
        0x0004_0000 => Some(WindowSize::KB256),
        0x0008_0000 => Some(WindowSize::KB512),
        0x0010_0000 => Some(WindowSize::MB1),
        0x0020_0000 => Some(WindowSize::MB2),
        0x0040_0000 => Some(WindowSize::MB4),
        0x0080_0000 => Some(WindowSize::MB8),
        0x0100_0000 => Some(WindowSize::MB16),
        0x0200_0000 => Some(WindowSize::MB32),
        _ => None,
    }
}

/// Serves byte ranges of the decompressed content section.
pub(crate) struct Decompressor {
    reset_table: LzxcResetTable,
    window_size: u32,
    /// Blocks between mandatory decoder resets
    reset_block_count: u64,
    /// Absolute offset of the reset table's per-block slot array
    slot_base: u64,
    /// Absolute offset of the compressed content object
    content_base: u64,
    /// Created on first use; `None` also after a failed window mapping
    pub(crate) lzx: Option<Box<dyn LzxStream>>,
    /// Index of the block the decoder most recently produced
    last: Option<u64>,
    pub(crate) cache: BlockCache,
}

impl std::fmt::Debug for Decompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decompressor")
            .field("reset_table", &self.reset_table)
            .field("window_size", &self.window_size)
            .field("reset_block_count", &self.reset_block_count)
            .field("slot_base", &self.slot_base)
            .field("content_base", &self.content_base)
            .field("lzx", &self.lzx.as_ref().map(|_| "..."))
            .field("last", &self.last)
            .field("cache", &self.cache)
            .finish()
    }
}

impl Decompressor {
    pub fn new(
        reset_table: LzxcResetTable,
        window_size: u32,
        reset_block_count: u64,
        slot_base: u64,
        content_base: u64,
    ) -> Self {
        Self {
            reset_table,
            window_size,
            reset_block_count,
            slot_base,
            content_base,
            lzx: None,
            last: None,
            cache: BlockCache::new(DEFAULT_CACHE_BLOCKS),
        }
    }

    pub fn set_cache_capacity(&mut self, capacity: usize) {
        self.cache.resize(capacity);
    }

    /// Read decompressed bytes at `start`, never crossing a block boundary.
    ///
    /// Returns the number of bytes produced; 0 means this region cannot be
    /// served (bad block, I/O failure, range past the section).
    pub fn read_region<S: ByteSource>(
        &mut self,
        source: &mut S,
        buf: &mut [u8],
        start: u64,
    ) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let block_len = self.reset_table.block_len;
        let block = start / block_len;
        let offset = (start % block_len) as usize;
        let want = buf.len().min((block_len as usize) - offset);

        if self.cache.get(block).is_none() {
            if let Err(e) = self.produce(source, block) {
                trace!(block, error = %e, "block production failed");
                return 0;
            }
        }
        let Some(data) = self.cache.get(block) else {
            return 0;
        };

        // The final block may produce less than a full block
        if offset >= data.len() {
            return 0;
        }
        let n = want.min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        n
    }

    /// Decode `block` into the cache, replaying the reset segment's prefix
    /// first when the decoder is not already positioned just before it.
    fn produce<S: ByteSource>(&mut self, source: &mut S, block: u64) -> Result<()> {
        if block >= u64::from(self.reset_table.block_count) {
            return Err(Error::BlockOutOfRange {
                block,
                count: self.reset_table.block_count.into(),
            });
        }

        let segment_base = block - block % self.reset_block_count;
        let first = match self.last {
            // Decoder sits inside this segment, before the target: resume
            Some(last) if last >= segment_base && last < block => last + 1,
            // Anywhere else: restart the segment, which resets the decoder
            _ => segment_base,
        };

        for b in first..=block {
            self.decode_block(source, b)?;
        }
        Ok(())
    }

    fn decode_block<S: ByteSource>(&mut self, source: &mut S, block: u64) -> Result<()> {
        if self.lzx.is_none() {
            let window = window_for_size(self.window_size)
                .ok_or(Error::UnsupportedWindowSize(self.window_size))?;
            self.lzx = Some(Box::new(LzxdStream::new(self.window_size, window)));
            self.last = None;
        }

        let (start, len) = self.block_bounds(source, block)?;
        let mut compressed = vec![0u8; len as usize];
        read_exact_at(source, start, &mut compressed)?;

        let block_len = self.reset_table.block_len;
        let remaining = self
            .reset_table
            .uncompressed_len
            .saturating_sub(block * block_len);
        let out_len = block_len.min(remaining) as usize;

        debug!(block, compressed = len, out_len, "decompressing block");

        let Some(lzx) = self.lzx.as_mut() else {
            return Err(Error::LzxDecode("decoder not initialized".into()));
        };
        if block % self.reset_block_count == 0 {
            lzx.reset();
        }
        let data = lzx.decode(&compressed, out_len)?;

        self.last = Some(block);
        self.cache.insert(block, data);
        Ok(())
    }

    /// Bounds of a block's compressed bytes: start comes from the reset
    /// table's slot array, end from the next slot (or the total compressed
    /// length for the last block).
    fn block_bounds<S: ByteSource>(&self, source: &mut S, block: u64) -> Result<(u64, u64)> {
        let mut slot = [0u8; 8];
        read_exact_at(source, self.slot_base + block * 8, &mut slot)?;
        let start = LittleEndian::read_u64(&slot);

        let end = if block + 1 < u64::from(self.reset_table.block_count) {
            read_exact_at(source, self.slot_base + (block + 1) * 8, &mut slot)?;
            LittleEndian::read_u64(&slot)
        } else {
            self.reset_table.compressed_len
        };

        if end < start || end - start > self.reset_table.block_len + LZX_MAX_GROWTH {
            return Err(Error::InvalidBlockBounds { block, start, end });
        }
        Ok((self.content_base + start, end - start))
    }
}
