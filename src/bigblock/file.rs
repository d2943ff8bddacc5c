//! BlockFile
//!
//! In-memory container image: a flat arena of big blocks plus the outer FAT
//! that threads them into chains. Loaded whole at open, written whole at save.

use std::fs;
use std::path::Path;

use bytes::{Buf, BufMut};

use crate::chain::{ChainEntry, END_OF_CHAIN, FAT_SECTOR, UNUSED};
use crate::config::Config;
use crate::error::{MiniStoreError, Result};
use crate::layout::SectorLayout;

use super::header::ContainerHeader;
use super::BlockStorage;

/// Container image held in memory
///
/// ## Invariants
/// - `fat.len() == fat_sectors.len() * entries_per_block`
/// - every ordinal in `fat_sectors` has FAT entry `FAT_SECTOR`
/// - physical blocks never outnumber FAT entries
/// - no UNUSED FAT entry exists below `free_hint`
#[derive(Debug, Clone)]
pub struct BlockFile {
    layout: SectorLayout,
    header: ContainerHeader,

    /// Raw outer FAT entries, one per addressable big block
    fat: Vec<u32>,

    /// Blocks holding the FAT itself, in FAT order
    fat_sectors: Vec<u32>,

    /// Block bytes; block `n` lives at `n * block_size`
    data: Vec<u8>,

    /// Where the next first-fit scan starts
    free_hint: usize,
}

impl BlockFile {
    /// Create an empty container holding only its first FAT sector
    pub fn new(config: &Config) -> Result<Self> {
        let layout = config.layout()?;
        let mut file = Self {
            layout,
            header: ContainerHeader::new(layout, config.mini_stream_cutoff),
            fat: Vec::new(),
            fat_sectors: Vec::new(),
            data: Vec::new(),
            free_hint: 0,
        };
        file.grow_fat();
        Ok(file)
    }

    /// Load a container from its serialized image
    pub fn from_image(image: &[u8]) -> Result<Self> {
        let header = ContainerHeader::decode(image)?;
        let layout = header.layout()?;
        let block_size = layout.big_block_size();

        if image.len() < block_size {
            return Err(MiniStoreError::InvalidImage(format!(
                "image of {} bytes is shorter than its {}-byte header block",
                image.len(),
                block_size
            )));
        }

        let mut data = image[block_size..].to_vec();
        let tail = data.len() % block_size;
        if tail != 0 {
            tracing::warn!(
                "Image ends with a partial block ({} bytes); padding with zeros",
                tail
            );
            data.resize(data.len() + block_size - tail, 0);
        }
        let physical = data.len() / block_size;

        // Reassemble the FAT from the sectors listed in the header
        let mut fat = Vec::with_capacity(header.difat.len() * layout.entries_per_block());
        for &sector in &header.difat {
            let ordinal = sector as usize;
            if ordinal >= physical {
                return Err(MiniStoreError::InvalidImage(format!(
                    "FAT sector {} lies beyond the {} blocks in the image",
                    sector, physical
                )));
            }

            let mut block = &data[ordinal * block_size..(ordinal + 1) * block_size];
            while block.has_remaining() {
                fat.push(block.get_u32_le());
            }
        }

        for &sector in &header.difat {
            if sector as usize >= fat.len() {
                return Err(MiniStoreError::InvalidImage(format!(
                    "FAT sector {} is not addressable by a FAT of {} entries",
                    sector,
                    fat.len()
                )));
            }
            if fat[sector as usize] != FAT_SECTOR {
                tracing::warn!(
                    "FAT sector {} is marked {} in the FAT; treating it as FAT_SECTOR",
                    sector,
                    ChainEntry::from_raw(fat[sector as usize])
                );
                fat[sector as usize] = FAT_SECTOR;
            }
        }

        if physical > fat.len() {
            tracing::warn!(
                "Image holds {} blocks but the FAT addresses only {}; dropping the rest",
                physical,
                fat.len()
            );
            data.truncate(fat.len() * block_size);
        }

        tracing::debug!(
            "Loaded image: {} blocks, {} FAT sector(s), block size {}",
            data.len() / block_size,
            header.difat.len(),
            block_size
        );

        Ok(Self {
            layout,
            fat_sectors: header.difat.clone(),
            header,
            fat,
            data,
            free_hint: 0,
        })
    }

    /// Read and load an image file
    pub fn open(path: &Path) -> Result<Self> {
        let image = fs::read(path)?;
        Self::from_image(&image)
    }

    /// Serialize the container: header block, then every block, with the
    /// FAT written into its own sectors
    pub fn to_image(&self) -> Result<Vec<u8>> {
        let block_size = self.layout.big_block_size();
        let entries_per_block = self.layout.entries_per_block();

        let mut header = self.header.clone();
        header.num_fat_sectors = self.fat_sectors.len() as u32;
        header.difat = self.fat_sectors.clone();

        let mut image = Vec::with_capacity(block_size + self.data.len());
        image.extend_from_slice(&header.encode(block_size)?);
        image.extend_from_slice(&self.data);

        for (k, &sector) in self.fat_sectors.iter().enumerate() {
            let offset = block_size + sector as usize * block_size;
            let mut dst = &mut image[offset..offset + block_size];
            for &entry in &self.fat[k * entries_per_block..(k + 1) * entries_per_block] {
                dst.put_u32_le(entry);
            }
        }

        Ok(image)
    }

    /// Serialize and write to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_image()?)?;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn layout(&self) -> SectorLayout {
        self.layout
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut ContainerHeader {
        &mut self.header
    }

    /// Blocks physically present in the image
    pub fn physical_block_count(&self) -> usize {
        self.data.len() / self.layout.big_block_size()
    }

    /// Ordinals of the blocks holding the FAT
    pub fn fat_sectors(&self) -> &[u32] {
        &self.fat_sectors
    }

    /// Blocks whose FAT entry is anything but UNUSED (FAT sectors included)
    pub fn allocated_block_count(&self) -> usize {
        self.fat.iter().filter(|&&entry| entry != UNUSED).count()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Overwrite one FAT entry
    pub fn set_next_block(&mut self, ordinal: u32, entry: ChainEntry) -> Result<()> {
        let slot = self
            .fat
            .get_mut(ordinal as usize)
            .ok_or(MiniStoreError::NoSuchBlock(ordinal))?;
        *slot = entry.to_raw();

        if entry.is_unused() {
            self.free_hint = self.free_hint.min(ordinal as usize);
        }
        Ok(())
    }

    /// Release every block of a chain. Returns the number of blocks freed.
    pub fn free_chain(&mut self, start: u32) -> Result<usize> {
        let chain = self.chain(Some(start))?;
        for &ordinal in &chain {
            self.fat[ordinal as usize] = UNUSED;
            self.free_hint = self.free_hint.min(ordinal as usize);
        }

        tracing::trace!("Freed outer chain at {} ({} blocks)", start, chain.len());
        Ok(chain.len())
    }

    /// Claim the first free block (growing the FAT if it is full), zero it,
    /// and mark it END_OF_CHAIN
    fn allocate_block(&mut self) -> u32 {
        let hint = self.free_hint.min(self.fat.len());
        let ordinal = match self.fat[hint..].iter().position(|&entry| entry == UNUSED) {
            Some(free) => (hint + free) as u32,
            None => self.grow_fat() + 1,
        };
        self.free_hint = ordinal as usize + 1;

        self.ensure_physical(ordinal);
        self.fat[ordinal as usize] = END_OF_CHAIN;

        let block_size = self.layout.big_block_size();
        let start = ordinal as usize * block_size;
        self.data[start..start + block_size].fill(0);

        ordinal
    }

    /// Append one FAT sector at the first ordinal past the current capacity.
    /// Returns the new sector's ordinal.
    fn grow_fat(&mut self) -> u32 {
        let ordinal = self.fat.len() as u32;
        self.fat
            .resize(self.fat.len() + self.layout.entries_per_block(), UNUSED);
        self.fat[ordinal as usize] = FAT_SECTOR;
        self.fat_sectors.push(ordinal);
        self.ensure_physical(ordinal);

        tracing::debug!(
            "Outer FAT grew to {} sector(s); new FAT sector at block {}",
            self.fat_sectors.len(),
            ordinal
        );
        ordinal
    }

    /// Make sure block `ordinal` has bytes behind it
    fn ensure_physical(&mut self, ordinal: u32) {
        let needed = (ordinal as usize + 1) * self.layout.big_block_size();
        if self.data.len() < needed {
            self.data.resize(needed, 0);
        }
    }
}

impl BlockStorage for BlockFile {
    fn block_size(&self) -> usize {
        self.layout.big_block_size()
    }

    fn block_capacity(&self) -> usize {
        self.fat.len()
    }

    fn next_block(&self, ordinal: u32) -> Result<ChainEntry> {
        self.fat
            .get(ordinal as usize)
            .map(|&raw| ChainEntry::from_raw(raw))
            .ok_or(MiniStoreError::NoSuchBlock(ordinal))
    }

    fn append_block_after(&mut self, last: Option<u32>) -> Result<u32> {
        if let Some(last) = last {
            let entry = self.next_block(last)?;
            if entry != ChainEntry::EndOfChain {
                return Err(MiniStoreError::MalformedChain(format!(
                    "big block {} is not a chain tail (entry {})",
                    last, entry
                )));
            }
        }

        let ordinal = self.allocate_block();
        if let Some(last) = last {
            self.fat[last as usize] = ordinal;
        }

        tracing::trace!("Appended big block {} after {:?}", ordinal, last);
        Ok(ordinal)
    }

    fn block(&self, ordinal: u32) -> Result<&[u8]> {
        let block_size = self.layout.big_block_size();
        let start = ordinal as usize * block_size;
        self.data
            .get(start..start + block_size)
            .ok_or(MiniStoreError::NoSuchBlock(ordinal))
    }

    fn block_mut(&mut self, ordinal: u32) -> Result<&mut [u8]> {
        let block_size = self.layout.big_block_size();
        let start = ordinal as usize * block_size;
        self.data
            .get_mut(start..start + block_size)
            .ok_or(MiniStoreError::NoSuchBlock(ordinal))
    }
}
