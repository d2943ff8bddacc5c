//! Mini Store Module
//!
//! Small streams are packed into 64-byte mini sectors instead of whole big
//! blocks. Two structures back them, both threaded through the outer FAT:
//!
//! ```text
//!        ┌──────────────────────────────┐
//!        │          MiniStore           │  next-block / free-block /
//!        │           (façade)           │  chain rewrite / size
//!        └──────┬────────────────┬──────┘
//!               │                │
//!               ▼                ▼
//!   ┌──────────────────┐  ┌──────────────────────┐
//!   │  MiniFatTable    │  │ MiniStreamContainer  │
//!   │  4-byte entries  │  │ mini-sector payload  │
//!   │  per mini sector │  │ bytes                │
//!   └────────┬─────────┘  └──────────┬───────────┘
//!            │   big-block chains    │
//!            └──────────┬────────────┘
//!                       ▼
//!               ┌───────────────┐
//!               │ BlockStorage  │  (outer FAT)
//!               └───────────────┘
//! ```
//!
//! A mini sector is only usable once both its mini-FAT entry slot and its
//! payload block exist.

mod container;
mod store;
mod table;

pub use container::MiniStreamContainer;
pub use store::MiniStore;
pub use table::MiniFatTable;

/// Starting big blocks of the two mini-store chains.
///
/// Supplied by the directory layer at open time; `None` means the chain has
/// no blocks yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MiniStoreRoots {
    pub mini_fat_start: Option<u32>,
    pub mini_stream_start: Option<u32>,
}

/// Snapshot handed to the directory layer at save time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiniStreamInfo {
    pub mini_fat_start: Option<u32>,
    pub mini_fat_blocks: usize,
    pub mini_stream_start: Option<u32>,
    pub mini_stream_blocks: usize,
    /// Occupied mini sectors times the mini sector size
    pub size: u64,
    /// Bytes up to and including the highest occupied mini sector
    pub high_water_mark: u64,
}

impl MiniStreamInfo {
    pub fn roots(&self) -> MiniStoreRoots {
        MiniStoreRoots {
            mini_fat_start: self.mini_fat_start,
            mini_stream_start: self.mini_stream_start,
        }
    }
}
