//! # ministore
//!
//! The two-level block allocator of a compound document container:
//! - An outer FAT threading big blocks (512 or 4096 bytes) into chains
//! - A mini-FAT threading 64-byte mini sectors for small streams
//! - A mini-stream container holding mini-sector payload in big blocks
//! - Size accounting recomputed from mini-FAT occupancy
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Stream reader / writer                        │
//! │        (next block, free block, update contents)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     MiniStore                                │
//! │               (façade + size accounting)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌───────────────┐
//!   │  Mini-FAT   │          │  Mini stream  │
//!   │   table     │          │   container   │
//!   └──────┬──────┘          └───────┬───────┘
//!          │                         │
//!          └────────────┬────────────┘
//!                       ▼
//!               ┌───────────────┐
//!               │   BlockFile   │
//!               │  (outer FAT)  │
//!               └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod layout;
pub mod chain;
pub mod bigblock;
pub mod ministore;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{MiniStoreError, Result};
pub use config::Config;
pub use chain::ChainEntry;
pub use layout::SectorLayout;
pub use bigblock::{BlockFile, BlockStorage};
pub use ministore::{MiniStore, MiniStoreRoots, MiniStreamInfo};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ministore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
