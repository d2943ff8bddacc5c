//! Mini-FAT Table
//!
//! Chain entries for every mini sector, held as a sequence of big blocks of
//! `entries_per_block` little-endian `u32` slots. Blocks are decoded at load,
//! edited in memory, and written back by `flush` when dirty.

use bytes::{Buf, BufMut};

use crate::bigblock::BlockStorage;
use crate::chain::{ChainEntry, UNUSED};
use crate::error::{MiniStoreError, Result};
use crate::layout::SectorLayout;

/// One big block's worth of mini-FAT entries
#[derive(Debug, Clone)]
struct MiniFatBlock {
    /// Outer big-block ordinal this block is stored in
    ordinal: u32,
    entries: Vec<u32>,
    dirty: bool,
}

/// The mini-FAT: one chain entry per mini sector
#[derive(Debug, Clone)]
pub struct MiniFatTable {
    layout: SectorLayout,

    /// First big block of the mini-FAT chain
    start: Option<u32>,

    blocks: Vec<MiniFatBlock>,

    /// No UNUSED entry exists below this index
    free_hint: u32,
}

impl MiniFatTable {
    /// Empty table (no blocks)
    pub fn new(layout: SectorLayout) -> Self {
        Self {
            layout,
            start: None,
            blocks: Vec::new(),
            free_hint: 0,
        }
    }

    /// Decode every block of the mini-FAT chain starting at `start`
    pub fn load<S: BlockStorage>(
        storage: &S,
        layout: SectorLayout,
        start: Option<u32>,
    ) -> Result<Self> {
        let chain = storage.chain(start)?;
        let mut blocks = Vec::with_capacity(chain.len());

        for ordinal in chain {
            let mut bytes = storage.block(ordinal)?;
            let mut entries = Vec::with_capacity(layout.entries_per_block());
            while bytes.remaining() >= 4 {
                entries.push(bytes.get_u32_le());
            }
            blocks.push(MiniFatBlock {
                ordinal,
                entries,
                dirty: false,
            });
        }

        Ok(Self {
            layout,
            start,
            blocks,
            free_hint: 0,
        })
    }

    /// First big block of the mini-FAT chain
    pub fn start(&self) -> Option<u32> {
        self.start
    }

    /// Number of mini-FAT blocks in the chain
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of entry slots across all blocks
    pub fn capacity(&self) -> usize {
        self.blocks.len() * self.layout.entries_per_block()
    }

    pub fn entry_at(&self, sector: u32) -> Result<ChainEntry> {
        let (block, index) = self.resolve(sector)?;
        Ok(ChainEntry::from_raw(self.blocks[block].entries[index]))
    }

    pub fn set_entry_at(&mut self, sector: u32, entry: ChainEntry) -> Result<()> {
        let (block, index) = self.resolve(sector)?;
        let block = &mut self.blocks[block];
        block.entries[index] = entry.to_raw();
        block.dirty = true;

        if entry.is_unused() && sector < self.free_hint {
            self.free_hint = sector;
        }
        Ok(())
    }

    /// Whether mini-FAT block `block` still has a free slot
    pub fn has_free_entry(&self, block: usize) -> Result<bool> {
        let block = self.blocks.get(block).ok_or(MiniStoreError::OutOfRange {
            sector: (block * self.layout.entries_per_block()) as u32,
            fat_blocks: self.blocks.len(),
        })?;
        Ok(block.entries.contains(&UNUSED))
    }

    /// Index of the first UNUSED entry at or after the hint.
    ///
    /// Only scans: the entry stays UNUSED until the caller writes it. When
    /// the whole chain is occupied a new block is appended to the mini-FAT
    /// chain through `storage` and its first slot is returned.
    pub fn find_free_sector<S: BlockStorage>(&mut self, storage: &mut S) -> Result<u32> {
        let per_block = self.layout.entries_per_block();
        let hint = self.free_hint as usize;
        let first_block = hint / per_block;

        for (b, block) in self.blocks.iter().enumerate().skip(first_block) {
            let from = if b == first_block { hint % per_block } else { 0 };
            if let Some(i) = block.entries[from..].iter().position(|&e| e == UNUSED) {
                let sector = (b * per_block + from + i) as u32;
                self.free_hint = sector;
                tracing::trace!("Free mini sector found at {}", sector);
                return Ok(sector);
            }
        }

        self.grow(storage)
    }

    /// Entries that are not UNUSED, across the whole chain
    pub fn occupied_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|block| block.entries.iter().filter(|&&e| e != UNUSED).count())
            .sum()
    }

    /// Highest sector whose entry is not UNUSED
    pub fn highest_occupied(&self) -> Option<u32> {
        let per_block = self.layout.entries_per_block();
        self.blocks.iter().enumerate().rev().find_map(|(b, block)| {
            block
                .entries
                .iter()
                .rposition(|&e| e != UNUSED)
                .map(|i| (b * per_block + i) as u32)
        })
    }

    /// Whether any block has edits not yet written to storage
    pub fn is_dirty(&self) -> bool {
        self.blocks.iter().any(|block| block.dirty)
    }

    /// Write dirty blocks back into their big blocks. Returns blocks written.
    pub fn flush<S: BlockStorage>(&mut self, storage: &mut S) -> Result<usize> {
        let mut written = 0;
        for block in self.blocks.iter_mut().filter(|block| block.dirty) {
            let mut dst = storage.block_mut(block.ordinal)?;
            for &entry in &block.entries {
                dst.put_u32_le(entry);
            }
            block.dirty = false;
            written += 1;
        }
        Ok(written)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn resolve(&self, sector: u32) -> Result<(usize, usize)> {
        let slot = self.layout.entry_slot(sector);
        if slot.fat_block >= self.blocks.len() {
            return Err(MiniStoreError::OutOfRange {
                sector,
                fat_blocks: self.blocks.len(),
            });
        }
        Ok((slot.fat_block, slot.index))
    }

    /// Append one all-UNUSED block and return its first sector.
    ///
    /// The block is written as UNUSED in storage right away, so an image
    /// taken before the next `flush` never shows zeroed (`Next(0)`) slots.
    fn grow<S: BlockStorage>(&mut self, storage: &mut S) -> Result<u32> {
        let tail = self.blocks.last().map(|block| block.ordinal);
        let ordinal = storage.append_block_after(tail)?;
        storage.block_mut(ordinal)?.fill(0xFF);
        if self.start.is_none() {
            self.start = Some(ordinal);
        }

        let sector = self.capacity() as u32;
        self.blocks.push(MiniFatBlock {
            ordinal,
            entries: vec![UNUSED; self.layout.entries_per_block()],
            dirty: true,
        });
        self.free_hint = 0;

        tracing::debug!(
            "Mini-FAT grew to {} block(s) (big block {}); first new sector {}",
            self.blocks.len(),
            ordinal,
            sector
        );
        Ok(sector)
    }
}
