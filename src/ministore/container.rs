//! Mini-Stream Container
//!
//! The big-block chain whose bytes are cut into mini sectors. Payload stays
//! in the outer storage; this type only remembers the chain and resolves
//! sector indices to byte ranges inside it.

use crate::bigblock::BlockStorage;
use crate::chain::MAX_REGULAR_SECTOR;
use crate::error::{MiniStoreError, Result};
use crate::layout::SectorLayout;

/// Chain of big blocks holding mini-sector payload
#[derive(Debug, Clone)]
pub struct MiniStreamContainer {
    layout: SectorLayout,

    /// First big block of the mini-stream chain
    start: Option<u32>,

    /// Outer ordinals of the chain, in order
    chain: Vec<u32>,
}

impl MiniStreamContainer {
    /// Empty container (no blocks)
    pub fn new(layout: SectorLayout) -> Self {
        Self {
            layout,
            start: None,
            chain: Vec::new(),
        }
    }

    /// Follow the mini-stream chain starting at `start`
    pub fn load<S: BlockStorage>(
        storage: &S,
        layout: SectorLayout,
        start: Option<u32>,
    ) -> Result<Self> {
        Ok(Self {
            layout,
            start,
            chain: storage.chain(start)?,
        })
    }

    /// First big block of the mini-stream chain
    pub fn start(&self) -> Option<u32> {
        self.start
    }

    /// Big blocks backing the container
    pub fn big_block_count(&self) -> usize {
        self.chain.len()
    }

    /// Mini sectors backed by real storage
    pub fn sector_capacity(&self) -> usize {
        self.chain.len() * self.layout.sectors_per_big_block()
    }

    /// Payload bytes of one mini sector
    pub fn block_at<'s, S: BlockStorage>(&self, storage: &'s S, sector: u32) -> Result<&'s [u8]> {
        let (ordinal, offset) = self.resolve(sector)?;
        let block = storage.block(ordinal)?;
        Ok(&block[offset..offset + self.layout.mini_sector_size()])
    }

    /// Mutable payload bytes of one mini sector
    pub fn block_at_mut<'s, S: BlockStorage>(
        &self,
        storage: &'s mut S,
        sector: u32,
    ) -> Result<&'s mut [u8]> {
        let (ordinal, offset) = self.resolve(sector)?;
        let block = storage.block_mut(ordinal)?;
        Ok(&mut block[offset..offset + self.layout.mini_sector_size()])
    }

    /// Append zero-filled big blocks until `sector` is backed.
    /// Returns the number of blocks appended.
    ///
    /// Sentinel values are not sector indices and are rejected with
    /// `NoSuchSector` before anything is allocated.
    pub fn ensure_capacity<S: BlockStorage>(&mut self, storage: &mut S, sector: u32) -> Result<usize> {
        if sector > MAX_REGULAR_SECTOR {
            return Err(MiniStoreError::NoSuchSector {
                sector,
                stream_blocks: self.chain.len(),
            });
        }

        let needed = self.layout.locate(sector).big_block + 1;
        let mut appended = 0;

        while self.chain.len() < needed {
            let ordinal = storage.append_block_after(self.chain.last().copied())?;
            if self.start.is_none() {
                self.start = Some(ordinal);
            }
            self.chain.push(ordinal);
            appended += 1;
        }

        if appended > 0 {
            tracing::debug!(
                "Mini stream grew by {} big block(s) to {} ({} sectors)",
                appended,
                self.chain.len(),
                self.sector_capacity()
            );
        }
        Ok(appended)
    }

    /// Store `bytes` in one mini sector, growing the container first.
    /// Short writes are zero-padded to the full sector.
    pub fn write_sector<S: BlockStorage>(
        &mut self,
        storage: &mut S,
        sector: u32,
        bytes: &[u8],
    ) -> Result<()> {
        let capacity = self.layout.mini_sector_size();
        if bytes.len() > capacity {
            return Err(MiniStoreError::SectorOverflow {
                len: bytes.len(),
                capacity,
            });
        }

        self.ensure_capacity(storage, sector)?;
        let dst = self.block_at_mut(storage, sector)?;
        dst[..bytes.len()].copy_from_slice(bytes);
        dst[bytes.len()..].fill(0);
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Outer ordinal and byte offset of a sector
    fn resolve(&self, sector: u32) -> Result<(u32, usize)> {
        let location = self.layout.locate(sector);
        let ordinal = self
            .chain
            .get(location.big_block)
            .copied()
            .ok_or(MiniStoreError::NoSuchSector {
                sector,
                stream_blocks: self.chain.len(),
            })?;
        Ok((ordinal, location.offset))
    }
}
