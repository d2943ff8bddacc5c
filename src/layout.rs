//! Sector Addressing
//!
//! Pure arithmetic mapping a mini-sector index onto the two structures that
//! back it:
//!
//! ```text
//!  mini sector i
//!     │
//!     ├── payload:  big block  i / sectors_per_big_block   of the mini stream
//!     │             offset    (i % sectors_per_big_block) * mini_sector_size
//!     │
//!     └── entry:    block      i / entries_per_block        of the mini-FAT
//!                   slot       i % entries_per_block
//! ```

/// Size in bytes of one chain entry on disk
pub const ENTRY_SIZE: usize = 4;

/// Fixed geometry of a container: big block size and mini sector size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorLayout {
    big_block_size: usize,
    mini_sector_size: usize,
}

/// Where a mini sector's payload lives inside the mini stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorLocation {
    /// Ordinal of the big block within the mini-stream chain
    pub big_block: usize,
    /// Byte offset of the sector inside that big block
    pub offset: usize,
}

/// Where a mini sector's chain entry lives inside the mini-FAT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySlot {
    /// Ordinal of the block within the mini-FAT chain
    pub fat_block: usize,
    /// Entry index inside that block
    pub index: usize,
}

impl SectorLayout {
    /// Build a layout. Sizes are expected to be validated already
    /// (see `Config::layout`).
    pub(crate) fn new(big_block_size: usize, mini_sector_size: usize) -> Self {
        Self {
            big_block_size,
            mini_sector_size,
        }
    }

    pub fn big_block_size(&self) -> usize {
        self.big_block_size
    }

    pub fn mini_sector_size(&self) -> usize {
        self.mini_sector_size
    }

    /// Mini sectors held by one big block of the mini stream
    pub fn sectors_per_big_block(&self) -> usize {
        self.big_block_size / self.mini_sector_size
    }

    /// Chain entries held by one big block of a FAT or mini-FAT
    pub fn entries_per_block(&self) -> usize {
        self.big_block_size / ENTRY_SIZE
    }

    /// Map a mini sector to its payload position
    pub fn locate(&self, sector: u32) -> SectorLocation {
        let sector = sector as usize;
        let per_block = self.sectors_per_big_block();
        SectorLocation {
            big_block: sector / per_block,
            offset: (sector % per_block) * self.mini_sector_size,
        }
    }

    /// Map a mini sector to its chain entry position
    pub fn entry_slot(&self, sector: u32) -> EntrySlot {
        let sector = sector as usize;
        let per_block = self.entries_per_block();
        EntrySlot {
            fat_block: sector / per_block,
            index: sector % per_block,
        }
    }

    /// Inverse of `locate`
    pub fn sector_at(&self, location: SectorLocation) -> u32 {
        (location.big_block * self.sectors_per_big_block()
            + location.offset / self.mini_sector_size) as u32
    }

    /// Inverse of `entry_slot`
    pub fn sector_for_slot(&self, slot: EntrySlot) -> u32 {
        (slot.fat_block * self.entries_per_block() + slot.index) as u32
    }

    /// log2 of the big block size, as stored in the container header
    pub fn sector_shift(&self) -> u16 {
        self.big_block_size.trailing_zeros() as u16
    }

    /// log2 of the mini sector size, as stored in the container header
    pub fn mini_sector_shift(&self) -> u16 {
        self.mini_sector_size.trailing_zeros() as u16
    }
}
