//! Big-Block Module
//!
//! The outer allocator: a FAT of big blocks that threads every chain in the
//! container, including the mini-FAT chain and the mini-stream chain.
//!
//! ## Image Format
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Header (one big block, 512 or 4096)    │
//! │   signature, versions, shifts          │
//! │   FAT sector count, mini-FAT start     │
//! │   109 DIFAT slots → FAT sector ordinals│
//! ├────────────────────────────────────────┤
//! │ Block 0                                │
//! ├────────────────────────────────────────┤
//! │ Block 1                                │
//! │ ... (FAT sectors are ordinary blocks   │
//! │      whose own entry is FAT_SECTOR)    │
//! └────────────────────────────────────────┘
//! ```

mod file;
mod header;

pub use file::BlockFile;
pub use header::{ContainerHeader, HEADER_DIFAT_SLOTS, SIGNATURE};

use crate::chain::{ChainEntry, ChainLoopDetector};
use crate::error::{MiniStoreError, Result};

/// Boundary contract between the mini store and whatever owns the big blocks.
///
/// Chains are identified by their first ordinal; `None` names a chain that
/// has no blocks yet.
pub trait BlockStorage {
    /// Size of one big block in bytes
    fn block_size(&self) -> usize;

    /// Number of ordinals the FAT can currently address
    fn block_capacity(&self) -> usize;

    /// FAT entry for a big block
    fn next_block(&self, ordinal: u32) -> Result<ChainEntry>;

    /// Allocate a zero-filled block and link it after `last`, which must be
    /// the END_OF_CHAIN tail of its chain (`None` starts a new chain).
    /// Returns the new block's ordinal.
    fn append_block_after(&mut self, last: Option<u32>) -> Result<u32>;

    /// Bytes of one big block
    fn block(&self, ordinal: u32) -> Result<&[u8]>;

    /// Mutable bytes of one big block
    fn block_mut(&mut self, ordinal: u32) -> Result<&mut [u8]>;

    /// Ordinals of a chain in order, checked for cycles and stray sentinels
    fn chain(&self, start: Option<u32>) -> Result<Vec<u32>> {
        let mut chain = Vec::new();
        let Some(mut current) = start else {
            return Ok(chain);
        };

        let mut detector = ChainLoopDetector::new(self.block_capacity());
        loop {
            detector.claim(current)?;
            chain.push(current);

            match self.next_block(current)? {
                ChainEntry::Next(next) => current = next,
                ChainEntry::EndOfChain => return Ok(chain),
                other => {
                    return Err(MiniStoreError::MalformedChain(format!(
                        "big block {} has entry {} inside a chain",
                        current, other
                    )))
                }
            }
        }
    }

    /// Allocate a zero-filled block and link it after the last block of the
    /// chain starting at `start` (or start a new chain). Returns its ordinal.
    ///
    /// Walks the whole chain; callers that already know the tail should use
    /// `append_block_after`.
    fn append_block_to_chain(&mut self, start: Option<u32>) -> Result<u32> {
        let last = self.chain(start)?.last().copied();
        self.append_block_after(last)
    }

    /// Number of blocks in a chain
    fn block_count(&self, start: Option<u32>) -> Result<usize> {
        Ok(self.chain(start)?.len())
    }
}
