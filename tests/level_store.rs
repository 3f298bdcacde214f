// Level-store behavior over a real database: the cascade, windowed
// fetches and removal rebalancing running against RocksDB rather than
// the in-memory bucket the unit tests use.

mod common;

use addrdex::chain::address::Address;
use addrdex::chain::types::{BlockHash, TxLoc};
use addrdex::error::{IndexError, Result};
use addrdex::index::entry::{serialize_entry, TX_ENTRY_SIZE};
use addrdex::index::key::{addr_to_key, key_for_level, AddrKey};
use addrdex::index::levels::{
    fetch_index_entries, max_entries_for_level, put_index_entry, remove_index_entries,
};
use addrdex::runtime::mdb::Mdb;
use common::snapshot_namespace;
use std::sync::Arc;
use tempfile::TempDir;

fn open_bucket() -> (Mdb, TempDir) {
    let temp = TempDir::new().unwrap();
    let db = Mdb::open_db(temp.path()).unwrap();
    (Mdb::from_db(db, b"txbyaddridx/"), temp)
}

fn test_addr_key() -> AddrKey {
    addr_to_key(&Address::PubKeyHashEcdsa([0x42; 20])).unwrap()
}

fn resolve_hash(id: &[u8]) -> Result<BlockHash> {
    let mut hash = [0u8; 32];
    hash[..4].copy_from_slice(id);
    Ok(BlockHash(hash))
}

fn append_entries(bucket: &Mdb, addr_key: &AddrKey, range: std::ops::RangeInclusive<u32>) {
    for i in range {
        let entry = serialize_entry(1, TxLoc { tx_start: i as usize, tx_len: 1 }, i);
        put_index_entry(bucket, addr_key, &entry).unwrap();
    }
}

fn level_counts(bucket: &Mdb, addr_key: &AddrKey) -> Vec<usize> {
    let mut counts = Vec::new();
    for level in 0..=u8::MAX {
        match bucket.get(&key_for_level(addr_key, level)).unwrap() {
            Some(data) => counts.push(data.len() / TX_ENTRY_SIZE),
            None => break,
        }
    }
    counts
}

fn assert_level_invariants(bucket: &Mdb, addr_key: &AddrKey) {
    let counts = level_counts(bucket, addr_key);
    let highest_populated = counts.iter().rposition(|&c| c > 0);

    for (level, &count) in counts.iter().enumerate() {
        let max = max_entries_for_level(level as u8);
        if level == 0 {
            assert!(count <= max);
        } else {
            assert!(count == 0 || count == max / 2 || count == max);
        }

        if let Some(top) = highest_populated {
            if level < top {
                let required = if level == 0 { 1 } else { max / 2 };
                assert!(count >= required);
            }
        }
    }
}

#[test]
fn cascade_layouts_match_expected_boundaries() {
    let (bucket, _temp) = open_bucket();
    let addr_key = test_addr_key();

    let checkpoints: &[(u32, &[usize])] = &[
        (7, &[7]),
        (8, &[8]),
        (9, &[1, 8]),
        (17, &[1, 16]),
        (25, &[1, 8, 16]),
        (41, &[1, 8, 32]),
        (49, &[1, 16, 32]),
        (57, &[1, 8, 16, 32]),
    ];

    let mut next = 1u32;
    for &(upto, expected) in checkpoints {
        append_entries(&bucket, &addr_key, next..=upto);
        next = upto + 1;
        assert_eq!(level_counts(&bucket, &addr_key), expected, "layout after {upto} entries");
        assert_level_invariants(&bucket, &addr_key);
    }
}

#[test]
fn round_trip_preserves_insertion_order() {
    let (bucket, _temp) = open_bucket();
    let addr_key = test_addr_key();

    append_entries(&bucket, &addr_key, 1..=120);

    let (entries, skipped) =
        fetch_index_entries(&bucket, &addr_key, 0, 120, false, resolve_hash).unwrap();
    assert_eq!(skipped, 0);
    let order: Vec<u32> = entries.iter().map(|e| e.block_index).collect();
    assert_eq!(order, (1..=120).collect::<Vec<_>>());

    let (entries, _) =
        fetch_index_entries(&bucket, &addr_key, 0, 120, true, resolve_hash).unwrap();
    let order: Vec<u32> = entries.iter().map(|e| e.block_index).collect();
    assert_eq!(order, (1..=120).rev().collect::<Vec<_>>());
}

#[test]
fn windowed_fetches_slice_the_sequence() {
    let (bucket, _temp) = open_bucket();
    let addr_key = test_addr_key();

    append_entries(&bucket, &addr_key, 1..=100);

    let (entries, skipped) =
        fetch_index_entries(&bucket, &addr_key, 10, 20, false, resolve_hash).unwrap();
    assert_eq!(skipped, 10);
    let got: Vec<u32> = entries.iter().map(|e| e.block_index).collect();
    assert_eq!(got, (11..=30).collect::<Vec<_>>());

    let (entries, skipped) =
        fetch_index_entries(&bucket, &addr_key, 10, 20, true, resolve_hash).unwrap();
    assert_eq!(skipped, 10);
    let got: Vec<u32> = entries.iter().map(|e| e.block_index).collect();
    assert_eq!(got, (71..=90).rev().collect::<Vec<_>>());

    for reverse in [false, true] {
        let (entries, skipped) =
            fetch_index_entries(&bucket, &addr_key, 1000, 5, reverse, resolve_hash).unwrap();
        assert!(entries.is_empty());
        assert_eq!(skipped, 100);
    }
}

#[test]
fn removal_round_trips_against_rocksdb() {
    let (bucket, _temp) = open_bucket();
    let addr_key = test_addr_key();

    append_entries(&bucket, &addr_key, 1..=49);
    let baseline = snapshot_namespace(&bucket);

    append_entries(&bucket, &addr_key, 50..=66);
    assert_level_invariants(&bucket, &addr_key);

    remove_index_entries(&bucket, &addr_key, 17).unwrap();
    assert_level_invariants(&bucket, &addr_key);
    assert_eq!(snapshot_namespace(&bucket), baseline);
}

#[test]
fn corrupt_level_data_surfaces_as_corruption() {
    let (bucket, _temp) = open_bucket();
    let addr_key = test_addr_key();

    bucket.put(&key_for_level(&addr_key, 0), &[0u8; 15]).unwrap();

    let err = fetch_index_entries(&bucket, &addr_key, 0, 5, false, resolve_hash).unwrap_err();
    assert!(matches!(err, IndexError::Corruption(_)));
}

#[test]
fn independent_addresses_do_not_interfere() {
    let (bucket, _temp) = open_bucket();
    let a = addr_to_key(&Address::PubKeyHashEcdsa([0x01; 20])).unwrap();
    let b = addr_to_key(&Address::ScriptHash([0x01; 20])).unwrap();

    append_entries(&bucket, &a, 1..=30);
    append_entries(&bucket, &b, 1..=5);

    remove_index_entries(&bucket, &a, 10).unwrap();

    let (entries_a, _) = fetch_index_entries(&bucket, &a, 0, 100, false, resolve_hash).unwrap();
    let (entries_b, _) = fetch_index_entries(&bucket, &b, 0, 100, false, resolve_hash).unwrap();
    assert_eq!(entries_a.len(), 20);
    assert_eq!(entries_b.len(), 5);
}

// Shared handle clones see the same bucket contents.
#[test]
fn bucket_handle_clones_share_state() {
    let temp = TempDir::new().unwrap();
    let db = Mdb::open_db(temp.path()).unwrap();
    let bucket = Mdb::from_db(Arc::clone(&db), b"txbyaddridx/");
    let clone = bucket.clone();

    let addr_key = test_addr_key();
    append_entries(&bucket, &addr_key, 1..=3);

    let (entries, _) = fetch_index_entries(&clone, &addr_key, 0, 10, false, resolve_hash).unwrap();
    assert_eq!(entries.len(), 3);
}
