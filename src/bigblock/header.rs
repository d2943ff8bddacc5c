//! Container header codec
//!
//! The first 512 bytes of an image. With 4096-byte blocks the header is
//! padded with zeros to a full block so that block `n` always starts at
//! `(n + 1) * block_size`.
//!
//! ```text
//! offset  size  field
//! 0x00    8     signature D0 CF 11 E0 A1 B1 1A E1
//! 0x08    16    class id (zero)
//! 0x18    2     minor version (0x003E)
//! 0x1A    2     major version (3 or 4)
//! 0x1C    2     byte order (0xFFFE)
//! 0x1E    2     sector shift (9 or 12)
//! 0x20    2     mini sector shift
//! 0x22    6     reserved
//! 0x28    4     directory sector count
//! 0x2C    4     FAT sector count
//! 0x30    4     first directory sector
//! 0x34    4     transaction signature
//! 0x38    4     mini stream cutoff
//! 0x3C    4     first mini-FAT sector
//! 0x40    4     mini-FAT sector count
//! 0x44    4     first DIFAT sector
//! 0x48    4     DIFAT sector count
//! 0x4C    436   109 DIFAT slots
//! ```

use bytes::{Buf, BufMut, BytesMut};

use crate::chain::{END_OF_CHAIN, UNUSED};
use crate::config::Config;
use crate::error::{MiniStoreError, Result};
use crate::layout::SectorLayout;

/// Magic bytes identifying a compound document
pub const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// FAT sector ordinals that fit in the header itself
pub const HEADER_DIFAT_SLOTS: usize = 109;

/// Encoded size of the header fields
pub(crate) const HEADER_SIZE: usize = 512;

const MINOR_VERSION: u16 = 0x003E;
const BYTE_ORDER_MARK: u16 = 0xFFFE;

/// Decoded container header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub minor_version: u16,
    pub major_version: u16,
    pub sector_shift: u16,
    pub mini_sector_shift: u16,
    pub num_directory_sectors: u32,
    pub num_fat_sectors: u32,
    /// Start of the directory chain; owned by the directory layer, kept verbatim
    pub first_directory_sector: u32,
    pub transaction_signature: u32,
    pub mini_stream_cutoff: u32,
    pub first_mini_fat_sector: u32,
    pub num_mini_fat_sectors: u32,
    pub first_difat_sector: u32,
    pub num_difat_sectors: u32,
    /// Ordinals of the FAT sectors, in FAT order
    pub difat: Vec<u32>,
}

impl ContainerHeader {
    /// Header for an empty container with the given geometry
    pub fn new(layout: SectorLayout, mini_stream_cutoff: u32) -> Self {
        let sector_shift = layout.sector_shift();
        Self {
            minor_version: MINOR_VERSION,
            major_version: if sector_shift == 12 { 4 } else { 3 },
            sector_shift,
            mini_sector_shift: layout.mini_sector_shift(),
            num_directory_sectors: 0,
            num_fat_sectors: 0,
            first_directory_sector: END_OF_CHAIN,
            transaction_signature: 0,
            mini_stream_cutoff,
            first_mini_fat_sector: END_OF_CHAIN,
            num_mini_fat_sectors: 0,
            first_difat_sector: END_OF_CHAIN,
            num_difat_sectors: 0,
            difat: Vec::new(),
        }
    }

    /// Configuration this container was written with
    pub fn config(&self) -> Result<Config> {
        if self.sector_shift >= 16 || self.mini_sector_shift >= self.sector_shift {
            return Err(MiniStoreError::InvalidImage(format!(
                "unsupported shifts: sector {} / mini sector {}",
                self.sector_shift, self.mini_sector_shift
            )));
        }

        let config = Config::builder()
            .big_block_size(1usize << self.sector_shift)
            .mini_sector_size(1usize << self.mini_sector_shift)
            .mini_stream_cutoff(self.mini_stream_cutoff)
            .build();

        config
            .layout()
            .map_err(|e| MiniStoreError::InvalidImage(e.to_string()))?;
        Ok(config)
    }

    /// Validated geometry described by the shifts
    pub fn layout(&self) -> Result<SectorLayout> {
        self.config()?.layout()
    }

    /// First block of the mini-FAT chain, if the container has one
    pub fn mini_fat_start(&self) -> Option<u32> {
        match self.first_mini_fat_sector {
            END_OF_CHAIN | UNUSED => None,
            start => Some(start),
        }
    }

    pub fn set_mini_fat(&mut self, start: Option<u32>, blocks: usize) {
        self.first_mini_fat_sector = start.unwrap_or(END_OF_CHAIN);
        self.num_mini_fat_sectors = blocks as u32;
    }

    /// Encode, padded to `block_size` bytes
    pub fn encode(&self, block_size: usize) -> Result<BytesMut> {
        if self.difat.len() > HEADER_DIFAT_SLOTS {
            return Err(MiniStoreError::InvalidImage(format!(
                "{} FAT sectors exceed the {} header DIFAT slots",
                self.difat.len(),
                HEADER_DIFAT_SLOTS
            )));
        }

        let mut buf = BytesMut::with_capacity(block_size.max(HEADER_SIZE));
        buf.put_slice(&SIGNATURE);
        buf.put_bytes(0, 16);
        buf.put_u16_le(self.minor_version);
        buf.put_u16_le(self.major_version);
        buf.put_u16_le(BYTE_ORDER_MARK);
        buf.put_u16_le(self.sector_shift);
        buf.put_u16_le(self.mini_sector_shift);
        buf.put_bytes(0, 6);
        buf.put_u32_le(self.num_directory_sectors);
        buf.put_u32_le(self.num_fat_sectors);
        buf.put_u32_le(self.first_directory_sector);
        buf.put_u32_le(self.transaction_signature);
        buf.put_u32_le(self.mini_stream_cutoff);
        buf.put_u32_le(self.first_mini_fat_sector);
        buf.put_u32_le(self.num_mini_fat_sectors);
        buf.put_u32_le(self.first_difat_sector);
        buf.put_u32_le(self.num_difat_sectors);

        for slot in 0..HEADER_DIFAT_SLOTS {
            buf.put_u32_le(self.difat.get(slot).copied().unwrap_or(UNUSED));
        }

        debug_assert_eq!(buf.len(), HEADER_SIZE);
        if block_size > HEADER_SIZE {
            buf.put_bytes(0, block_size - HEADER_SIZE);
        }

        Ok(buf)
    }

    /// Decode from the start of an image
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(MiniStoreError::InvalidImage(format!(
                "header truncated: {} of {} bytes",
                buf.len(),
                HEADER_SIZE
            )));
        }

        let mut signature = [0u8; 8];
        buf.copy_to_slice(&mut signature);
        if signature != SIGNATURE {
            return Err(MiniStoreError::InvalidImage(format!(
                "bad signature {:02X?}",
                signature
            )));
        }

        buf.advance(16);
        let minor_version = buf.get_u16_le();
        let major_version = buf.get_u16_le();

        let byte_order = buf.get_u16_le();
        if byte_order != BYTE_ORDER_MARK {
            return Err(MiniStoreError::InvalidImage(format!(
                "bad byte order mark {:#06x}",
                byte_order
            )));
        }

        let sector_shift = buf.get_u16_le();
        let mini_sector_shift = buf.get_u16_le();
        buf.advance(6);

        let mut header = Self {
            minor_version,
            major_version,
            sector_shift,
            mini_sector_shift,
            num_directory_sectors: buf.get_u32_le(),
            num_fat_sectors: buf.get_u32_le(),
            first_directory_sector: buf.get_u32_le(),
            transaction_signature: buf.get_u32_le(),
            mini_stream_cutoff: buf.get_u32_le(),
            first_mini_fat_sector: buf.get_u32_le(),
            num_mini_fat_sectors: buf.get_u32_le(),
            first_difat_sector: buf.get_u32_le(),
            num_difat_sectors: buf.get_u32_le(),
            difat: Vec::new(),
        };

        // Validates the shifts
        header.layout()?;

        if header.num_difat_sectors != 0 {
            return Err(MiniStoreError::InvalidImage(format!(
                "{} DIFAT sectors present; only header DIFAT slots are supported",
                header.num_difat_sectors
            )));
        }

        let fat_sectors = header.num_fat_sectors as usize;
        if fat_sectors > HEADER_DIFAT_SLOTS {
            return Err(MiniStoreError::InvalidImage(format!(
                "{} FAT sectors exceed the {} header DIFAT slots",
                fat_sectors, HEADER_DIFAT_SLOTS
            )));
        }

        header.difat = (0..fat_sectors).map(|_| buf.get_u32_le()).collect();

        Ok(header)
    }
}
