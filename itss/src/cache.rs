//! Bounded cache of decompressed blocks
//!
//! Placement is purely positional: block `b` lives in slot `b % capacity`,
//! and a different block claiming an occupied slot evicts the occupant
//! unconditionally. There is no recency ordering.

use tracing::trace;

/// Default number of cached blocks per archive.
pub(crate) const DEFAULT_CACHE_BLOCKS: usize = 5;
/// Hard cap on the cache capacity.
pub(crate) const MAX_CACHE_BLOCKS: usize = 128;

#[derive(Debug)]
struct CachedBlock {
    index: u64,
    data: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct BlockCache {
    slots: Vec<Option<CachedBlock>>,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_CACHE_BLOCKS);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, block: u64) -> usize {
        (block % self.slots.len() as u64) as usize
    }

    pub fn get(&self, block: u64) -> Option<&[u8]> {
        match &self.slots[self.slot(block)] {
            Some(cached) if cached.index == block => Some(&cached.data),
            _ => None,
        }
    }

    pub fn insert(&mut self, block: u64, data: Vec<u8>) {
        let slot = self.slot(block);
        if let Some(old) = &self.slots[slot] {
            if old.index != block {
                trace!(evicted = old.index, incoming = block, slot, "cache collision");
            }
        }
        self.slots[slot] = Some(CachedBlock { index: block, data });
    }

    /// Change the capacity, re-mapping every cached block to its new slot.
    ///
    /// When two surviving blocks land in the same slot the incoming block
    /// wins and the previous claimant is discarded.
    pub fn resize(&mut self, capacity: usize) {
        let capacity = capacity.clamp(1, MAX_CACHE_BLOCKS);
        if capacity == self.slots.len() {
            return;
        }
        let mut slots: Vec<Option<CachedBlock>> = (0..capacity).map(|_| None).collect();
        for cached in self.slots.drain(..).flatten() {
            let slot = (cached.index % capacity as u64) as usize;
            slots[slot] = Some(cached);
        }
        self.slots = slots;
    }
}
