//! Shared fixtures for the mini store tests

#![allow(dead_code)]

use ministore::{BlockFile, Config, MiniStore};

/// Sector lengths of the streams in the reference layout, written in order.
///
/// Together they occupy mini sectors 0..=180: the first mini-FAT block is
/// full and the second is in use up to sector 180.
pub const REFERENCE_STREAMS: &[usize] = &[51, 53, 1, 1, 1, 48, 6, 6, 6, 2, 1, 2, 3];

/// Total sectors used by the reference layout
pub const REFERENCE_SECTORS: u32 = 181;

pub fn new_store() -> MiniStore<BlockFile> {
    new_store_with(&Config::default())
}

pub fn new_store_with(config: &Config) -> MiniStore<BlockFile> {
    let file = BlockFile::new(config).unwrap();
    MiniStore::create(file, config).unwrap()
}

/// Byte every position of mini sector `sector` is filled with
pub fn fill_byte(sector: u32) -> u8 {
    (sector % 250 + 1) as u8
}

/// Contents for a stream of `sectors` full sectors starting at `first`
pub fn stream_data(first: u32, sectors: usize, sector_size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(sectors * sector_size);
    for s in 0..sectors as u32 {
        data.extend(std::iter::repeat(fill_byte(first + s)).take(sector_size));
    }
    data
}

/// Store holding the reference layout. Returns the store and each stream's head.
pub fn reference_store() -> (MiniStore<BlockFile>, Vec<u32>) {
    let mut store = new_store();
    let sector_size = store.layout().mini_sector_size();
    let mut heads = Vec::new();
    let mut next_sector = 0u32;

    for &sectors in REFERENCE_STREAMS {
        let data = stream_data(next_sector, sectors, sector_size);
        let head = store.update_contents(None, &data).unwrap().unwrap();
        assert_eq!(head, next_sector);
        heads.push(head);
        next_sector += sectors as u32;
    }

    (store, heads)
}
