//! Chain entries
//!
//! A chain entry is the 4-byte little-endian value stored in a FAT or
//! mini-FAT slot. It either names the next unit of the same chain or is one
//! of the reserved sentinels at the top of the `u32` range.

use std::fmt;

use crate::error::{MiniStoreError, Result};

// =============================================================================
// Raw Sentinel Values (bit-exact on disk)
// =============================================================================

/// Slot is free
pub const UNUSED: u32 = 0xFFFF_FFFF;

/// Last unit of a chain
pub const END_OF_CHAIN: u32 = 0xFFFF_FFFE;

/// Block holds allocation-table entries of the outer FAT
pub const FAT_SECTOR: u32 = 0xFFFF_FFFD;

/// Block holds entries of the outer double-indirect FAT
pub const DIFAT_SECTOR: u32 = 0xFFFF_FFFC;

/// Highest value that is a regular unit index
pub const MAX_REGULAR_SECTOR: u32 = 0xFFFF_FFFA;

/// Decoded chain entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainEntry {
    /// Continue the chain at this index
    Next(u32),
    /// The chain ends here
    EndOfChain,
    /// Slot is free
    Unused,
    /// Outer FAT bookkeeping block; never a mini-sector entry
    FatSector,
    /// Outer DIFAT bookkeeping block; never a mini-sector entry
    DifatSector,
    /// Any other reserved value; kept verbatim so it round-trips
    Reserved(u32),
}

impl ChainEntry {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            UNUSED => ChainEntry::Unused,
            END_OF_CHAIN => ChainEntry::EndOfChain,
            FAT_SECTOR => ChainEntry::FatSector,
            DIFAT_SECTOR => ChainEntry::DifatSector,
            n if n <= MAX_REGULAR_SECTOR => ChainEntry::Next(n),
            other => ChainEntry::Reserved(other),
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            ChainEntry::Next(n) => n,
            ChainEntry::EndOfChain => END_OF_CHAIN,
            ChainEntry::Unused => UNUSED,
            ChainEntry::FatSector => FAT_SECTOR,
            ChainEntry::DifatSector => DIFAT_SECTOR,
            ChainEntry::Reserved(raw) => raw,
        }
    }

    pub fn is_unused(self) -> bool {
        self == ChainEntry::Unused
    }
}

impl From<u32> for ChainEntry {
    fn from(raw: u32) -> Self {
        ChainEntry::from_raw(raw)
    }
}

impl From<ChainEntry> for u32 {
    fn from(entry: ChainEntry) -> Self {
        entry.to_raw()
    }
}

impl fmt::Display for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainEntry::Next(n) => write!(f, "{}", n),
            ChainEntry::EndOfChain => f.write_str("END_OF_CHAIN"),
            ChainEntry::Unused => f.write_str("UNUSED"),
            ChainEntry::FatSector => f.write_str("FAT_SECTOR"),
            ChainEntry::DifatSector => f.write_str("DIFAT_SECTOR"),
            ChainEntry::Reserved(raw) => write!(f, "RESERVED({:#010x})", raw),
        }
    }
}

// =============================================================================
// Loop Detection
// =============================================================================

/// Guards a chain traversal against cycles and out-of-range pointers.
///
/// Every unit visited must be `claim`ed exactly once; a second claim of the
/// same index, or a claim beyond `limit`, is reported as a malformed chain.
#[derive(Debug)]
pub struct ChainLoopDetector {
    seen: Vec<bool>,
}

impl ChainLoopDetector {
    /// `limit` is the number of addressable units (valid indices are `0..limit`)
    pub fn new(limit: usize) -> Self {
        Self {
            seen: vec![false; limit],
        }
    }

    /// Raise the limit after the underlying table has grown
    pub fn extend_limit(&mut self, limit: usize) {
        if limit > self.seen.len() {
            self.seen.resize(limit, false);
        }
    }

    pub fn claim(&mut self, index: u32) -> Result<()> {
        let limit = self.seen.len();
        let slot = self.seen.get_mut(index as usize).ok_or_else(|| {
            MiniStoreError::MalformedChain(format!(
                "index {} points outside the {} addressable units",
                index, limit
            ))
        })?;

        if *slot {
            return Err(MiniStoreError::MalformedChain(format!(
                "index {} visited twice (chain loops back on itself)",
                index
            )));
        }

        *slot = true;
        Ok(())
    }
}
