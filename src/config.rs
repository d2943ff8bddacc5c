//! Configuration for ministore
//!
//! Block geometry with sensible defaults (format version 3: 512-byte big
//! blocks, 64-byte mini sectors, 4096-byte mini-stream cutoff).

use crate::error::{MiniStoreError, Result};
use crate::layout::SectorLayout;

/// Big block size used by format version 3 containers
pub const BIG_BLOCK_SIZE_V3: usize = 512;

/// Big block size used by format version 4 containers
pub const BIG_BLOCK_SIZE_V4: usize = 4096;

/// Main configuration for a container
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Geometry
    // -------------------------------------------------------------------------
    /// Size of one big block (the container's native allocation unit)
    pub big_block_size: usize,

    /// Size of one mini sector inside the mini stream
    pub mini_sector_size: usize,

    // -------------------------------------------------------------------------
    // Placement Policy
    // -------------------------------------------------------------------------
    /// Streams strictly smaller than this many bytes live in the mini stream
    pub mini_stream_cutoff: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            big_block_size: BIG_BLOCK_SIZE_V3,
            mini_sector_size: 64,
            mini_stream_cutoff: 4096,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validate the geometry and derive the sector layout from it
    pub fn layout(&self) -> Result<SectorLayout> {
        if self.big_block_size != BIG_BLOCK_SIZE_V3 && self.big_block_size != BIG_BLOCK_SIZE_V4 {
            return Err(MiniStoreError::Config(format!(
                "big block size must be {} or {}, got {}",
                BIG_BLOCK_SIZE_V3, BIG_BLOCK_SIZE_V4, self.big_block_size
            )));
        }

        if !self.mini_sector_size.is_power_of_two() || self.mini_sector_size < 4 {
            return Err(MiniStoreError::Config(format!(
                "mini sector size must be a power of two >= 4, got {}",
                self.mini_sector_size
            )));
        }

        if self.mini_sector_size >= self.big_block_size {
            return Err(MiniStoreError::Config(format!(
                "mini sector size {} must be smaller than big block size {}",
                self.mini_sector_size, self.big_block_size
            )));
        }

        Ok(SectorLayout::new(self.big_block_size, self.mini_sector_size))
    }

    /// Whether a stream of `len` bytes belongs in the mini stream
    pub fn fits_mini_stream(&self, len: u64) -> bool {
        len < u64::from(self.mini_stream_cutoff)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the big block size (512 or 4096)
    pub fn big_block_size(mut self, size: usize) -> Self {
        self.config.big_block_size = size;
        self
    }

    /// Set the mini sector size
    pub fn mini_sector_size(mut self, size: usize) -> Self {
        self.config.mini_sector_size = size;
        self
    }

    /// Set the mini-stream cutoff (in bytes)
    pub fn mini_stream_cutoff(mut self, cutoff: u32) -> Self {
        self.config.mini_stream_cutoff = cutoff;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
