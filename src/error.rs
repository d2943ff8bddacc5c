//! Error types for ministore
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using MiniStoreError
pub type Result<T> = std::result::Result<T, MiniStoreError>;

/// Unified error type for ministore operations
#[derive(Debug, Error)]
pub enum MiniStoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Addressing Errors (recoverable by growing the lagging structure)
    // -------------------------------------------------------------------------
    /// The mini-FAT block that would hold this sector's entry does not exist yet
    #[error("Mini sector {sector} is out of range: mini-FAT has {fat_blocks} block(s)")]
    OutOfRange { sector: u32, fat_blocks: usize },

    /// The mini-stream big block that would hold this sector's bytes does not exist yet
    #[error("No such mini sector {sector}: mini stream has {stream_blocks} big block(s)")]
    NoSuchSector { sector: u32, stream_blocks: usize },

    /// An outer big-block ordinal that is not backed by the container
    #[error("No such big block: {0}")]
    NoSuchBlock(u32),

    // -------------------------------------------------------------------------
    // Structural Errors
    // -------------------------------------------------------------------------
    #[error("Malformed chain: {0}")]
    MalformedChain(String),

    #[error("Invalid container image: {0}")]
    InvalidImage(String),

    #[error("Sector overflow: {len} bytes do not fit in a {capacity}-byte sector")]
    SectorOverflow { len: usize, capacity: usize },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
