//! Tests for IndexTable
//!
//! These tests verify:
//! - Upserts replace entries in place and keep datasize exact
//! - Removal gives the value length back
//! - Iteration order is first-insertion order (scan cursors)
//! - Delete/reinsert churn does not grow the table without bound

use zerokv::data::DataLocation;
use zerokv::index::{IndexEntry, IndexLocation, IndexTable};

// =============================================================================
// Helper Functions
// =============================================================================

fn entry(key: &[u8], length: u32) -> IndexEntry {
    IndexEntry {
        key: key.to_vec(),
        data: DataLocation {
            segment: 0,
            offset: 19,
        },
        length,
        crc: 0,
        flags: 0,
        timestamp: 0,
        location: IndexLocation {
            segment: 0,
            offset: 19,
        },
        previous: None,
    }
}

fn keys(table: &IndexTable) -> Vec<Vec<u8>> {
    table.iter().map(|e| e.key.clone()).collect()
}

// =============================================================================
// Accounting Tests
// =============================================================================

#[test]
fn test_new_table_is_empty() {
    let table = IndexTable::new();

    assert!(table.is_empty());
    assert_eq!(table.len(), 0);
    assert_eq!(table.datasize(), 0);
    assert!(table.first().is_none());
}

#[test]
fn test_upsert_new_and_replace() {
    let mut table = IndexTable::new();

    assert!(table.upsert(entry(b"a", 10)).is_none());
    assert!(table.upsert(entry(b"b", 5)).is_none());
    assert_eq!(table.datasize(), 15);

    let old = table.upsert(entry(b"a", 3)).unwrap();
    assert_eq!(old.length, 10);
    assert_eq!(table.len(), 2);
    assert_eq!(table.datasize(), 8);
    assert_eq!(table.get(b"a").unwrap().length, 3);
}

#[test]
fn test_remove_gives_length_back() {
    let mut table = IndexTable::new();
    table.upsert(entry(b"a", 10));
    table.upsert(entry(b"b", 5));

    let removed = table.remove(b"a").unwrap();

    assert_eq!(removed.length, 10);
    assert_eq!(table.datasize(), 5);
    assert!(!table.contains(b"a"));
    assert!(table.get(b"a").is_none());
    assert!(table.remove(b"a").is_none());
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_iteration_in_insertion_order() {
    let mut table = IndexTable::new();
    for key in [b"c", b"a", b"b"] {
        table.upsert(entry(key, 1));
    }

    // an update keeps the original position
    table.upsert(entry(b"c", 2));

    assert_eq!(keys(&table), vec![b"c".to_vec(), b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn test_first_and_after_walk_all_entries() {
    let mut table = IndexTable::new();
    for key in [b"x", b"y", b"z"] {
        table.upsert(entry(key, 1));
    }
    table.remove(b"y");

    let first = table.first().unwrap();
    assert_eq!(first.key, b"x");

    let second = table.after(b"x").unwrap();
    assert_eq!(second.key, b"z");

    assert!(table.after(b"z").is_none());
    assert!(table.after(b"y").is_none());
}

#[test]
fn test_reinserted_key_moves_to_end() {
    let mut table = IndexTable::new();
    table.upsert(entry(b"a", 1));
    table.upsert(entry(b"b", 1));

    table.remove(b"a");
    table.upsert(entry(b"a", 1));

    assert_eq!(keys(&table), vec![b"b".to_vec(), b"a".to_vec()]);
}

#[test]
fn test_churn_compacts_and_keeps_order() {
    let mut table = IndexTable::new();
    let mut expected: Vec<Vec<u8>> = Vec::new();

    for i in 0..100u32 {
        let key = i.to_le_bytes().to_vec();
        table.upsert(entry(&key, 1));
        expected.push(key);
    }

    // delete and reinsert the first half over and over
    for round in 0..1000u32 {
        let key = (round % 50).to_le_bytes().to_vec();
        table.remove(&key).unwrap();
        table.upsert(entry(&key, 1));

        expected.retain(|k| k != &key);
        expected.push(key);
    }

    assert_eq!(table.len(), 100);
    assert_eq!(table.datasize(), 100);
    assert!(table.arena_len() <= 2 * table.len() + 1);

    let mut walked = vec![table.first().unwrap().key.clone()];
    while let Some(next) = table.after(walked.last().unwrap()) {
        walked.push(next.key.clone());
    }
    assert_eq!(walked, expected);
    assert_eq!(keys(&table), expected);
}
