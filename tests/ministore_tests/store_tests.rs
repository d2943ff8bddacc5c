//! Tests for the MiniStore façade
//!
//! These tests verify:
//! - Chain lookups over the reference layout
//! - Payload lookups and the NoSuchSector growth signal
//! - Free-block search with spare sectors, and with none (mini-FAT growth)
//! - Stream writes: new chains, extension, truncation, release
//! - Open question: malformed chains are detected

#[path = "../common/mod.rs"]
mod common;

use common::{fill_byte, new_store, reference_store, REFERENCE_SECTORS, REFERENCE_STREAMS};
use ministore::bigblock::BlockStorage;
use ministore::{BlockFile, ChainEntry, Config, MiniStore, MiniStoreError};

// =============================================================================
// get_next_block()
// =============================================================================

#[test]
fn test_next_block_follows_reference_chains() {
    let (store, heads) = reference_store();

    for (head, &len) in heads.iter().zip(REFERENCE_STREAMS) {
        let last = head + len as u32 - 1;
        for sector in *head..last {
            assert_eq!(store.get_next_block(sector).unwrap(), ChainEntry::Next(sector + 1));
        }
        assert_eq!(store.get_next_block(last).unwrap(), ChainEntry::EndOfChain);
    }
}

#[test]
fn test_next_block_spot_checks() {
    let (store, _heads) = reference_store();

    assert_eq!(store.get_next_block(50).unwrap(), ChainEntry::EndOfChain);
    assert_eq!(store.get_next_block(103).unwrap(), ChainEntry::EndOfChain);
    assert_eq!(store.get_next_block(104).unwrap(), ChainEntry::EndOfChain);
    assert_eq!(store.get_next_block(173).unwrap(), ChainEntry::Next(174));
    assert_eq!(store.get_next_block(178).unwrap(), ChainEntry::Next(179));
    assert_eq!(store.get_next_block(179).unwrap(), ChainEntry::Next(180));
    assert_eq!(store.get_next_block(180).unwrap(), ChainEntry::EndOfChain);
}

#[test]
fn test_unallocated_sectors_are_unused() {
    let (store, _heads) = reference_store();

    for sector in REFERENCE_SECTORS..256 {
        assert_eq!(store.get_next_block(sector).unwrap(), ChainEntry::Unused);
    }
}

#[test]
fn test_next_block_without_mini_fat() {
    let store = new_store();

    assert!(matches!(
        store.get_next_block(0),
        Err(MiniStoreError::OutOfRange { sector: 0, fat_blocks: 0 })
    ));
}

#[test]
fn test_chain_walk_reaches_end_in_chain_length_steps() {
    let (store, heads) = reference_store();

    for (head, &len) in heads.iter().zip(REFERENCE_STREAMS) {
        let chain = store.read_chain(*head).unwrap();
        assert_eq!(chain.len(), len);
        assert_eq!(chain[0], *head);
    }
}

// =============================================================================
// get_block_at() / create_block_if_needed()
// =============================================================================

#[test]
fn test_block_contents() {
    let (store, _heads) = reference_store();

    for sector in [0u32, 1, 51, 104, 180] {
        let bytes = store.get_block_at(sector).unwrap();
        assert_eq!(bytes.len(), 64);
        assert!(bytes.iter().all(|&b| b == fill_byte(sector)));
    }

    // Rest of the last big block is zeros
    for sector in 181..184 {
        assert!(store.get_block_at(sector).unwrap().iter().all(|&b| b == 0));
    }
}

#[test]
fn test_create_block_if_needed() {
    let (mut store, _heads) = reference_store();

    // Payload only covers sectors to 183
    for sector in 0..=183 {
        store.get_block_at(sector).unwrap();
    }
    assert!(matches!(
        store.get_block_at(184),
        Err(MiniStoreError::NoSuchSector { sector: 184, stream_blocks: 23 })
    ));
    assert_eq!(store.container().big_block_count(), 23);

    store.create_block_if_needed(184).unwrap();

    assert_eq!(store.container().big_block_count(), 24);
    let start = store.container().start();
    assert_eq!(store.storage().block_count(start).unwrap(), 24);
    for sector in 184..=191 {
        assert!(store.get_block_at(sector).unwrap().iter().all(|&b| b == 0));
    }
    assert!(store.get_block_at(192).is_err());

    // Redundant call is a no-op
    store.create_block_if_needed(190).unwrap();
    assert_eq!(store.container().big_block_count(), 24);
}

#[test]
fn test_extend_chain_through_new_payload_blocks() {
    let (mut store, _heads) = reference_store();
    store.create_block_if_needed(184).unwrap();

    // 178 -> 179 -> 180 grows to 15 sectors: 178..=192
    let head = store.update_contents(Some(178), &[0u8; 15 * 64]).unwrap();

    assert_eq!(head, Some(178));
    for sector in 178..192 {
        assert_eq!(store.get_next_block(sector).unwrap(), ChainEntry::Next(sector + 1));
    }
    assert_eq!(store.get_next_block(192).unwrap(), ChainEntry::EndOfChain);
    for sector in 193..256 {
        assert_eq!(store.get_next_block(sector).unwrap(), ChainEntry::Unused);
    }
    assert_eq!(store.container().big_block_count(), 25);
}

// =============================================================================
// get_free_block()
// =============================================================================

#[test]
fn test_free_block_with_spare() {
    let (mut store, _heads) = reference_store();

    assert!(!store.table().has_free_entry(0).unwrap());
    assert!(store.table().has_free_entry(1).unwrap());

    assert_eq!(store.get_free_block().unwrap(), 181);
    // Not written, so asked again it is still 181
    assert_eq!(store.get_free_block().unwrap(), 181);

    store.set_next_block(181, ChainEntry::EndOfChain).unwrap();
    assert_eq!(store.get_free_block().unwrap(), 182);
}

#[test]
fn test_free_block_with_none_spare() {
    let (mut store, _heads) = reference_store();

    for sector in REFERENCE_SECTORS..256 {
        store.set_next_block(sector, ChainEntry::EndOfChain).unwrap();
    }
    assert!(!store.table().has_free_entry(0).unwrap());
    assert!(!store.table().has_free_entry(1).unwrap());
    assert!(matches!(
        store.table().has_free_entry(2),
        Err(MiniStoreError::OutOfRange { .. })
    ));

    // Needs a third mini-FAT block
    assert_eq!(store.get_free_block().unwrap(), 256);

    assert_eq!(store.table().block_count(), 3);
    assert!(store.table().has_free_entry(2).unwrap());
    assert_eq!(store.get_next_block(254).unwrap(), ChainEntry::EndOfChain);
    assert_eq!(store.get_next_block(255).unwrap(), ChainEntry::EndOfChain);
    for sector in 256..384 {
        assert_eq!(store.get_next_block(sector).unwrap(), ChainEntry::Unused);
    }
}

#[test]
fn test_allocated_sector_is_never_handed_out() {
    let mut store = new_store();
    let mut allocated = Vec::new();

    for _ in 0..300 {
        let free = store.get_free_block().unwrap();
        assert!(!allocated.contains(&free));
        store.set_next_block(free, ChainEntry::EndOfChain).unwrap();
        allocated.push(free);
    }

    // Release one; it becomes available again
    store.set_next_block(17, ChainEntry::Unused).unwrap();
    assert_eq!(store.get_free_block().unwrap(), 17);
}

// =============================================================================
// update_contents()
// =============================================================================

#[test]
fn test_first_stream_creates_both_chains() {
    let mut store = new_store();

    // Only the FAT sector exists at first
    assert_eq!(store.storage().next_block(0).unwrap(), ChainEntry::FatSector);
    assert_eq!(store.storage().next_block(1).unwrap(), ChainEntry::Unused);

    let data: Vec<u8> = (0..8).map(|i| i + 42).collect();
    let head = store.update_contents(None, &data).unwrap();

    assert_eq!(head, Some(0));
    // Mini-FAT at block 1, mini stream at block 2
    assert_eq!(store.storage().next_block(1).unwrap(), ChainEntry::EndOfChain);
    assert_eq!(store.storage().next_block(2).unwrap(), ChainEntry::EndOfChain);
    assert_eq!(store.storage().next_block(3).unwrap(), ChainEntry::Unused);
    assert_eq!(store.get_next_block(0).unwrap(), ChainEntry::EndOfChain);
    assert_eq!(store.get_next_block(1).unwrap(), ChainEntry::Unused);

    // A second small stream reuses both chains
    let second = store.update_contents(None, &data).unwrap();
    assert_eq!(second, Some(1));
    assert_eq!(store.storage().next_block(3).unwrap(), ChainEntry::Unused);
    assert_eq!(store.get_next_block(2).unwrap(), ChainEntry::Unused);

    assert_eq!(store.read_contents(0, 8).unwrap(), data);
    assert_eq!(store.read_contents(1, 8).unwrap(), data);
}

#[test]
fn test_multi_sector_streams() {
    let mut store = new_store();
    let two: Vec<u8> = (0..64 + 14).map(|i| (i + 4) as u8).collect();
    let one: Vec<u8> = (0..63).map(|i| (i + 2) as u8).collect();

    let head2 = store.update_contents(None, &two).unwrap().unwrap();
    assert_eq!(store.get_free_block().unwrap(), 2);

    let head1 = store.update_contents(None, &one).unwrap().unwrap();
    assert_eq!(store.get_free_block().unwrap(), 3);

    assert_eq!(store.read_contents(head2, two.len()).unwrap(), two);
    assert_eq!(store.read_contents(head1, one.len()).unwrap(), one);
}

#[test]
fn test_shorter_rewrite_releases_tail() {
    let mut store = new_store();
    let head = store.update_contents(None, &[1u8; 5 * 64]).unwrap().unwrap();
    assert_eq!(store.table().occupied_count(), 5);

    let same = store.update_contents(Some(head), &[2u8; 2 * 64]).unwrap();

    assert_eq!(same, Some(head));
    assert_eq!(store.read_chain(head).unwrap(), vec![0, 1]);
    for sector in 2..5 {
        assert_eq!(store.get_next_block(sector).unwrap(), ChainEntry::Unused);
    }
    assert_eq!(store.table().occupied_count(), 2);
    assert_eq!(store.get_free_block().unwrap(), 2);
}

#[test]
fn test_empty_rewrite_releases_chain() {
    let mut store = new_store();
    let head = store.update_contents(None, &[9u8; 3 * 64]).unwrap();

    let result = store.update_contents(head, &[]).unwrap();

    assert_eq!(result, None);
    assert_eq!(store.table().occupied_count(), 0);
    assert_eq!(store.update_contents(None, &[]).unwrap(), None);
}

#[test]
fn test_extension_skips_sectors_owned_by_other_streams() {
    let mut store = new_store();
    let a = store.update_contents(None, &[1u8; 64]).unwrap().unwrap();
    let b = store.update_contents(None, &[2u8; 64]).unwrap().unwrap();

    store.update_contents(Some(a), &[3u8; 3 * 64]).unwrap();

    assert_eq!(store.read_chain(a).unwrap(), vec![0, 2, 3]);
    assert_eq!(store.read_chain(b).unwrap(), vec![1]);
    assert_eq!(store.read_contents(b, 64).unwrap(), vec![2u8; 64]);
}

#[test]
fn test_free_chain() {
    let (mut store, heads) = reference_store();

    let released = store.free_chain(heads[0]).unwrap();

    assert_eq!(released, 51);
    assert_eq!(store.get_next_block(0).unwrap(), ChainEntry::Unused);
    assert_eq!(store.get_free_block().unwrap(), 0);
}

#[test]
fn test_read_contents_beyond_chain() {
    let mut store = new_store();
    let head = store.update_contents(None, &[1u8; 64]).unwrap().unwrap();

    let result = store.read_contents(head, 65);
    assert!(matches!(result, Err(MiniStoreError::MalformedChain(_))));
}

// =============================================================================
// Malformed Chains
// =============================================================================

#[test]
fn test_self_cycle_is_detected() {
    let mut store = new_store();
    let head = store.update_contents(None, &[1u8; 64]).unwrap().unwrap();
    store.set_next_block(head, ChainEntry::Next(head)).unwrap();

    assert!(matches!(
        store.read_chain(head),
        Err(MiniStoreError::MalformedChain(_))
    ));
    assert!(matches!(
        store.update_contents(Some(head), &[0u8; 3 * 64]),
        Err(MiniStoreError::MalformedChain(_))
    ));
}

#[test]
fn test_longer_cycle_is_detected() {
    let mut store = new_store();
    let head = store.update_contents(None, &[1u8; 4 * 64]).unwrap().unwrap();
    store.set_next_block(3, ChainEntry::Next(1)).unwrap();

    assert!(matches!(
        store.free_chain(head),
        Err(MiniStoreError::MalformedChain(_))
    ));
    // Nothing was released
    assert_eq!(store.table().occupied_count(), 4);
}

#[test]
fn test_unused_entry_inside_chain_is_detected() {
    let mut store = new_store();
    store.update_contents(None, &[1u8; 2 * 64]).unwrap();
    store.set_next_block(0, ChainEntry::Next(50)).unwrap();

    assert!(matches!(
        store.read_chain(0),
        Err(MiniStoreError::MalformedChain(_))
    ));
}

// =============================================================================
// Open
// =============================================================================

#[test]
fn test_open_rejects_mismatched_block_size() {
    let file = BlockFile::new(&Config::default()).unwrap();
    let config = Config::builder().big_block_size(4096).build();

    let result = MiniStore::open(file, &config, Default::default());
    assert!(matches!(result, Err(MiniStoreError::Config(_))));
}

#[test]
fn test_create_block_rejects_sentinel_index() {
    let mut store = new_store();

    let result = store.create_block_if_needed(0xFFFF_FFFE);

    assert!(matches!(result, Err(MiniStoreError::NoSuchSector { .. })));
    assert_eq!(store.container().big_block_count(), 0);
}

// =============================================================================
// Writing Through the Façade
// =============================================================================

#[test]
fn test_manual_sector_write_protocol() {
    let mut store = new_store();

    // Claim, back, fill, then link a two-sector chain by hand
    let first = store.get_free_block().unwrap();
    store.set_next_block(first, ChainEntry::EndOfChain).unwrap();
    let second = store.get_free_block().unwrap();
    store.set_next_block(second, ChainEntry::EndOfChain).unwrap();
    store.set_next_block(first, ChainEntry::Next(second)).unwrap();

    for (sector, byte) in [(first, 0xA1u8), (second, 0xB2)] {
        store.create_block_if_needed(sector).unwrap();
        store.get_block_at_mut(sector).unwrap().fill(byte);
    }

    assert_eq!((first, second), (0, 1));
    assert_eq!(store.read_chain(first).unwrap(), vec![0, 1]);
    let contents = store.read_contents(first, 128).unwrap();
    assert!(contents[..64].iter().all(|&b| b == 0xA1));
    assert!(contents[64..].iter().all(|&b| b == 0xB2));
    assert_eq!(store.compute_size(), 128);
}

#[test]
fn test_get_block_at_mut_before_growth() {
    let mut store = new_store();

    assert!(matches!(
        store.get_block_at_mut(0),
        Err(MiniStoreError::NoSuchSector { sector: 0, stream_blocks: 0 })
    ));
}

#[test]
fn test_mutable_payload_edits_only_its_sector() {
    let (mut store, _heads) = reference_store();

    store.get_block_at_mut(51).unwrap()[..4].copy_from_slice(b"mini");

    assert_eq!(&store.get_block_at(51).unwrap()[..4], b"mini");
    assert!(store.get_block_at(51).unwrap()[4..].iter().all(|&b| b == fill_byte(51)));
    assert!(store.get_block_at(50).unwrap().iter().all(|&b| b == fill_byte(50)));
    assert!(store.get_block_at(52).unwrap().iter().all(|&b| b == fill_byte(52)));
}
