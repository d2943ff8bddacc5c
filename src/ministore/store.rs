//! Mini Store
//!
//! Façade over the mini-FAT table and the mini-stream container. Stream
//! readers and writers only ever talk to this type.

use crate::bigblock::BlockStorage;
use crate::chain::{ChainEntry, ChainLoopDetector};
use crate::config::Config;
use crate::error::{MiniStoreError, Result};
use crate::layout::SectorLayout;

use super::{MiniFatTable, MiniStoreRoots, MiniStreamContainer, MiniStreamInfo};

/// Allocator for mini sectors
///
/// Owns the outer storage together with both mini structures, so every
/// growth of either structure happens inside one of its operations.
///
/// ## Chain entry lifecycle
/// ```text
/// UNUSED ──allocate──► END_OF_CHAIN ──link──► Next(n)
///    ▲                      │
///    └──────release─────────┘
/// ```
pub struct MiniStore<S> {
    storage: S,
    layout: SectorLayout,
    table: MiniFatTable,
    container: MiniStreamContainer,
}

impl<S: BlockStorage> MiniStore<S> {
    /// Start a mini store with no mini-FAT and no mini stream
    pub fn create(storage: S, config: &Config) -> Result<Self> {
        let layout = Self::checked_layout(&storage, config)?;
        Ok(Self {
            table: MiniFatTable::new(layout),
            container: MiniStreamContainer::new(layout),
            storage,
            layout,
        })
    }

    /// Load both mini structures from existing chains in `storage`
    pub fn open(storage: S, config: &Config, roots: MiniStoreRoots) -> Result<Self> {
        let layout = Self::checked_layout(&storage, config)?;
        let table = MiniFatTable::load(&storage, layout, roots.mini_fat_start)?;
        let container = MiniStreamContainer::load(&storage, layout, roots.mini_stream_start)?;

        if let Some(highest) = table.highest_occupied() {
            if highest as usize >= container.sector_capacity() {
                tracing::warn!(
                    "Mini-FAT allocates sector {} but the mini stream only backs {} sectors",
                    highest,
                    container.sector_capacity()
                );
            }
        }

        tracing::debug!(
            "Opened mini store: {} mini-FAT block(s), {} mini-stream block(s), {} sectors in use",
            table.block_count(),
            container.big_block_count(),
            table.occupied_count()
        );

        Ok(Self {
            storage,
            layout,
            table,
            container,
        })
    }

    fn checked_layout(storage: &S, config: &Config) -> Result<SectorLayout> {
        let layout = config.layout()?;
        if layout.big_block_size() != storage.block_size() {
            return Err(MiniStoreError::Config(format!(
                "configured big block size {} does not match storage block size {}",
                layout.big_block_size(),
                storage.block_size()
            )));
        }
        Ok(layout)
    }

    // =========================================================================
    // Façade
    // =========================================================================

    /// Entry following `sector` in its chain
    ///
    /// Returns `Next(n)`, `EndOfChain`, or `Unused` for a sector that was
    /// never allocated. Fails with `OutOfRange` when no mini-FAT block holds
    /// the entry yet.
    pub fn get_next_block(&self, sector: u32) -> Result<ChainEntry> {
        self.table.entry_at(sector)
    }

    pub fn set_next_block(&mut self, sector: u32, entry: ChainEntry) -> Result<()> {
        self.table.set_entry_at(sector, entry)
    }

    /// A free sector, growing the mini-FAT if none is left.
    ///
    /// Does not allocate: until the caller writes the entry, repeated calls
    /// return the same index.
    pub fn get_free_block(&mut self) -> Result<u32> {
        self.table.find_free_sector(&mut self.storage)
    }

    /// Payload bytes of a sector. `NoSuchSector` means the mini stream has
    /// not been grown that far yet; see `create_block_if_needed`.
    pub fn get_block_at(&self, sector: u32) -> Result<&[u8]> {
        self.container.block_at(&self.storage, sector)
    }

    /// Writable payload bytes of a sector, for stream writers that fill a
    /// sector themselves after `get_free_block` and `create_block_if_needed`
    pub fn get_block_at_mut(&mut self, sector: u32) -> Result<&mut [u8]> {
        self.container.block_at_mut(&mut self.storage, sector)
    }

    /// Grow the mini stream so that `sector` is backed. Redundant calls are no-ops.
    pub fn create_block_if_needed(&mut self, sector: u32) -> Result<()> {
        self.container.ensure_capacity(&mut self.storage, sector)?;
        Ok(())
    }

    /// Rewrite a stream's contents, reusing its chain from `start`.
    ///
    /// Sectors beyond the old chain are taken from `get_free_block` and
    /// linked on; sectors the new contents no longer need are released.
    /// Returns the chain head, or `None` when `data` is empty and the whole
    /// chain was released.
    pub fn update_contents(&mut self, start: Option<u32>, data: &[u8]) -> Result<Option<u32>> {
        if data.is_empty() {
            if let Some(start) = start {
                self.free_chain(start)?;
            }
            return Ok(None);
        }

        let mut detector = ChainLoopDetector::new(self.table.capacity());
        let mut head = start;
        let mut prev: Option<u32> = None;
        let mut next = start;

        for chunk in data.chunks(self.layout.mini_sector_size()) {
            let this = match next {
                Some(existing) => {
                    detector.claim(existing)?;
                    existing
                }
                None => {
                    let free = self.get_free_block()?;
                    detector.extend_limit(self.table.capacity());
                    detector.claim(free)?;

                    self.set_next_block(free, ChainEntry::EndOfChain)?;
                    match prev {
                        Some(prev) => self.set_next_block(prev, ChainEntry::Next(free))?,
                        None => head = Some(free),
                    }
                    free
                }
            };

            self.create_block_if_needed(this)?;
            self.container.write_sector(&mut self.storage, this, chunk)?;

            next = match self.get_next_block(this)? {
                ChainEntry::Next(n) => Some(n),
                ChainEntry::EndOfChain => None,
                other => {
                    return Err(MiniStoreError::MalformedChain(format!(
                        "mini sector {} has entry {} inside a chain",
                        this, other
                    )))
                }
            };
            prev = Some(this);
        }

        // Release whatever the old chain still had past the new end
        if let Some(tail) = next {
            let released = self.free_chain(tail)?;
            tracing::trace!("Truncated chain at {}: released {} sector(s)", tail, released);
        }
        if let Some(last) = prev {
            self.set_next_block(last, ChainEntry::EndOfChain)?;
        }

        tracing::trace!(
            "Updated chain {:?}: {} bytes in {} sector(s)",
            head,
            data.len(),
            data.len().div_ceil(self.layout.mini_sector_size())
        );
        Ok(head)
    }

    // =========================================================================
    // Size Accounting
    // =========================================================================

    /// Logical size of the mini stream: occupied mini-FAT entries times the
    /// mini sector size, recomputed from the table on every call
    pub fn compute_size(&self) -> u64 {
        self.table.occupied_count() as u64 * self.layout.mini_sector_size() as u64
    }

    /// Bytes the mini stream must span to cover the highest occupied sector
    pub fn high_water_mark(&self) -> u64 {
        self.table
            .highest_occupied()
            .map_or(0, |s| (u64::from(s) + 1) * self.layout.mini_sector_size() as u64)
    }

    // =========================================================================
    // Chain Traversal
    // =========================================================================

    /// Sectors of the chain starting at `start`, in order.
    ///
    /// Cycles, pointers past the mini-FAT, and UNUSED or reserved entries
    /// inside the chain are reported as `MalformedChain`.
    pub fn read_chain(&self, start: u32) -> Result<Vec<u32>> {
        let mut detector = ChainLoopDetector::new(self.table.capacity());
        let mut chain = Vec::new();
        let mut current = start;

        loop {
            detector.claim(current)?;
            chain.push(current);

            match self.table.entry_at(current)? {
                ChainEntry::Next(next) => current = next,
                ChainEntry::EndOfChain => return Ok(chain),
                other => {
                    return Err(MiniStoreError::MalformedChain(format!(
                        "mini sector {} has entry {} inside a chain",
                        current, other
                    )))
                }
            }
        }
    }

    /// First `len` bytes of the stream starting at `start`
    pub fn read_contents(&self, start: u32, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len);

        for sector in self.read_chain(start)? {
            if out.len() >= len {
                break;
            }
            let bytes = self.get_block_at(sector)?;
            let take = bytes.len().min(len - out.len());
            out.extend_from_slice(&bytes[..take]);
        }

        if out.len() < len {
            return Err(MiniStoreError::MalformedChain(format!(
                "chain at {} holds {} bytes, stream claims {}",
                start,
                out.len(),
                len
            )));
        }
        Ok(out)
    }

    /// Release every sector of a chain (entries become UNUSED).
    /// Returns the number of sectors released.
    pub fn free_chain(&mut self, start: u32) -> Result<usize> {
        let chain = self.read_chain(start)?;
        for &sector in &chain {
            self.table.set_entry_at(sector, ChainEntry::Unused)?;
        }
        Ok(chain.len())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write dirty mini-FAT blocks into storage and report what the
    /// directory layer needs to persist
    pub fn flush(&mut self) -> Result<MiniStreamInfo> {
        let written = self.table.flush(&mut self.storage)?;
        let info = self.info();

        tracing::debug!(
            "Flushed {} mini-FAT block(s); mini stream size {} (high water {})",
            written,
            info.size,
            info.high_water_mark
        );
        Ok(info)
    }

    /// Current chain starts, block counts, and sizes
    pub fn info(&self) -> MiniStreamInfo {
        MiniStreamInfo {
            mini_fat_start: self.table.start(),
            mini_fat_blocks: self.table.block_count(),
            mini_stream_start: self.container.start(),
            mini_stream_blocks: self.container.big_block_count(),
            size: self.compute_size(),
            high_water_mark: self.high_water_mark(),
        }
    }

    pub fn roots(&self) -> MiniStoreRoots {
        MiniStoreRoots {
            mini_fat_start: self.table.start(),
            mini_stream_start: self.container.start(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn layout(&self) -> SectorLayout {
        self.layout
    }

    pub fn table(&self) -> &MiniFatTable {
        &self.table
    }

    pub fn container(&self) -> &MiniStreamContainer {
        &self.container
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Give the outer storage back. Unflushed mini-FAT edits are lost.
    pub fn into_storage(self) -> S {
        self.storage
    }
}
