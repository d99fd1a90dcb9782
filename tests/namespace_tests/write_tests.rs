//! Tests for the namespace write path
//!
//! These tests verify:
//! - A stored value reads back with its timestamp
//! - Overwrites and deletes keep datasize exact
//! - Writing the same content again is a no-op
//! - Quotas account for the value being replaced
//! - Rotation keeps data and index segments paired
//! - Locked namespaces reject every write

use zerokv::error::KvError;
use zerokv::mode::KeyMode;
use zerokv::segment::{SegmentKind, SEGMENT_HEADER_SIZE};
use zerokv::{SetOutcome, SetRequest};

use crate::{open_namespace, settings, setup_temp_namespace};

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_set_then_get() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);

    let outcome = ns.set(SetRequest::new(b"hello", b"world")).unwrap();
    assert_eq!(outcome.key(), b"hello");
    assert!(matches!(outcome, SetOutcome::Stored { .. }));

    let stored = ns.get(b"hello").unwrap().unwrap();
    assert_eq!(stored.value, b"world");
    assert_eq!(Some(stored.timestamp), ns.keytime(b"hello"));
    assert!(ns.exists(b"hello"));
    assert_eq!(ns.check(b"hello").unwrap(), Some(true));
}

#[test]
fn test_get_missing_key() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);

    assert!(ns.get(b"missing").unwrap().is_none());
    assert!(!ns.exists(b"missing"));
    assert_eq!(ns.check(b"missing").unwrap(), None);
    assert_eq!(ns.keytime(b"missing"), None);
}

#[test]
fn test_explicit_timestamp_is_kept() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);

    let request = SetRequest {
        timestamp: Some(1_234_567),
        ..SetRequest::new(b"k", b"v")
    };
    ns.set(request).unwrap();

    assert_eq!(ns.get(b"k").unwrap().unwrap().timestamp, 1_234_567);
}

#[test]
fn test_overwrite_adjusts_datasize() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);

    ns.set(SetRequest::new(b"a", &[1u8; 10])).unwrap();
    ns.set(SetRequest::new(b"b", &[2u8; 20])).unwrap();
    assert_eq!(ns.datasize(), 30);

    ns.set(SetRequest::new(b"a", &[3u8; 4])).unwrap();
    assert_eq!(ns.datasize(), 24);
    assert_eq!(ns.entries(), 2);
    assert_eq!(ns.get(b"a").unwrap().unwrap().value, vec![3u8; 4]);
}

#[test]
fn test_same_content_is_unchanged() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);

    ns.set(SetRequest::new(b"k", b"same")).unwrap();
    let position = ns.position();

    let outcome = ns.set(SetRequest::new(b"k", b"same")).unwrap();

    assert_eq!(outcome, SetOutcome::Unchanged { key: b"k".to_vec() });
    assert_eq!(ns.position(), position);
    assert_eq!(ns.history(b"k").unwrap().len(), 1);
}

#[test]
fn test_empty_value_is_stored() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);

    ns.set(SetRequest::new(b"empty", b"")).unwrap();

    assert_eq!(ns.get(b"empty").unwrap().unwrap().value, b"");
    assert_eq!(ns.datasize(), 0);
}

#[test]
fn test_key_too_large() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);

    let key = vec![b'k'; 256];
    let err = ns.set(SetRequest::new(&key, b"v")).unwrap_err();

    assert!(matches!(err, KvError::InvalidArgument(ref m) if m == "Key too large"));
    assert_eq!(ns.entries(), 0);
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_then_get() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);
    ns.set(SetRequest::new(b"k", b"value")).unwrap();

    ns.delete(b"k").unwrap();

    assert!(ns.get(b"k").unwrap().is_none());
    assert_eq!(ns.entries(), 0);
    assert_eq!(ns.datasize(), 0);
}

#[test]
fn test_delete_missing_key() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);

    let err = ns.delete(b"nope").unwrap_err();
    assert!(matches!(err, KvError::NotFound(_)));
}

#[test]
fn test_set_after_delete() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);
    ns.set(SetRequest::new(b"k", b"first")).unwrap();
    ns.delete(b"k").unwrap();

    ns.set(SetRequest::new(b"k", b"second")).unwrap();

    assert_eq!(ns.get(b"k").unwrap().unwrap().value, b"second");
    assert_eq!(ns.history(b"k").unwrap().len(), 1);
}

// =============================================================================
// History / Scan Tests
// =============================================================================

#[test]
fn test_history_lists_versions_newest_first() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);

    for (i, value) in [b"one".as_slice(), b"two", b"three"].into_iter().enumerate() {
        let request = SetRequest {
            timestamp: Some(100 + i as i64),
            ..SetRequest::new(b"k", value)
        };
        ns.set(request).unwrap();
    }

    let history = ns.history(b"k").unwrap();
    let values: Vec<&[u8]> = history.iter().map(|v| v.value.as_slice()).collect();
    let timestamps: Vec<i64> = history.iter().map(|v| v.timestamp).collect();

    assert_eq!(values, vec![b"three".as_slice(), b"two", b"one"]);
    assert_eq!(timestamps, vec![102, 101, 100]);
}

#[test]
fn test_scan_walks_keys_in_insertion_order() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);
    for key in [b"c", b"a", b"b"] {
        ns.set(SetRequest::new(key, b"v")).unwrap();
    }

    let mut cursor: Option<Vec<u8>> = None;
    let mut seen = Vec::new();
    while let Some(entry) = ns.scan(cursor.as_deref()).unwrap() {
        assert_eq!(entry.length, 1);
        seen.push(entry.key.clone());
        cursor = Some(entry.key);
    }

    assert_eq!(seen, vec![b"c".to_vec(), b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn test_scan_empty_namespace_and_bad_cursor() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);

    assert!(ns.scan(None).unwrap().is_none());

    let err = ns.scan(Some(b"unknown")).unwrap_err();
    assert!(matches!(err, KvError::InvalidArgument(_)));
}

// =============================================================================
// Quota Tests
// =============================================================================

#[test]
fn test_quota_counts_replaced_value() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);
    ns.update_meta(|meta| meta.maxsize = Some(100)).unwrap();

    ns.set(SetRequest::new(b"a", &[0u8; 60])).unwrap();
    assert_eq!(ns.datasize(), 60);

    let err = ns.set(SetRequest::new(b"b", &[0u8; 50])).unwrap_err();
    assert!(matches!(err, KvError::QuotaExceeded));
    assert!(!ns.exists(b"b"));
    assert_eq!(ns.datasize(), 60);

    // shrinking `a` frees room for `b`
    ns.set(SetRequest::new(b"a", &[1u8; 40])).unwrap();
    assert_eq!(ns.datasize(), 40);

    ns.set(SetRequest::new(b"b", &[0u8; 50])).unwrap();
    assert_eq!(ns.datasize(), 90);
}

#[test]
fn test_quota_full_namespace() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);
    ns.update_meta(|meta| meta.maxsize = Some(100)).unwrap();

    ns.set(SetRequest::new(b"a", &[0u8; 70])).unwrap();
    ns.set(SetRequest::new(b"b", &[0u8; 30])).unwrap();
    assert_eq!(ns.datasize(), 100);

    // no room for a new key, not even a single byte
    let err = ns.set(SetRequest::new(b"c", b"x")).unwrap_err();
    assert!(matches!(err, KvError::QuotaExceeded));
    assert!(!ns.exists(b"c"));

    // an equal-size update fits
    ns.set(SetRequest::new(b"a", &[1u8; 70])).unwrap();
    assert_eq!(ns.datasize(), 100);
    assert_eq!(ns.get(b"a").unwrap().unwrap().value, vec![1u8; 70]);

    // growing does not
    let err = ns.set(SetRequest::new(b"b", &[1u8; 31])).unwrap_err();
    assert!(matches!(err, KvError::QuotaExceeded));
    assert_eq!(ns.get(b"b").unwrap().unwrap().value, vec![0u8; 30]);

    // shrinking does
    ns.set(SetRequest::new(b"b", &[2u8; 10])).unwrap();
    assert_eq!(ns.datasize(), 80);
}

#[test]
fn test_quota_sequential_update() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::Sequential);
    ns.update_meta(|meta| meta.maxsize = Some(50)).unwrap();

    let first = ns.set(SetRequest::new(b"", &[0u8; 30])).unwrap().into_key();
    ns.set(SetRequest::new(b"", &[0u8; 20])).unwrap();
    assert_eq!(ns.datasize(), 50);

    let err = ns.set(SetRequest::new(b"", b"x")).unwrap_err();
    assert!(matches!(err, KvError::QuotaExceeded));

    // the replaced value is found through the 4-byte key
    ns.set(SetRequest::new(&first, &[1u8; 30])).unwrap();
    assert_eq!(ns.datasize(), 50);

    ns.set(SetRequest::new(&first, &[1u8; 5])).unwrap();
    assert_eq!(ns.datasize(), 25);
    assert_eq!(ns.get(&first).unwrap().unwrap().value, vec![1u8; 5]);
}

#[test]
fn test_quota_rejection_writes_nothing() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);
    ns.update_meta(|meta| meta.maxsize = Some(10)).unwrap();
    let position = ns.position();

    assert!(ns.set(SetRequest::new(b"big", &[0u8; 11])).is_err());

    assert_eq!(ns.position(), position);
}

// =============================================================================
// Rotation Tests
// =============================================================================

#[test]
fn test_rotation_pairs_segments() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let ns = open_namespace(&temp_dir, settings(KeyMode::UserKey, 100));

    ns.set(SetRequest::new(b"a", &[1u8; 50])).unwrap();
    assert_eq!(ns.position().0, 0);

    ns.set(SetRequest::new(b"b", &[2u8; 50])).unwrap();
    assert_eq!(ns.position().0, 1);

    assert_eq!(SegmentKind::Data.list(ns.data_dir()).unwrap(), vec![0, 1]);
    assert_eq!(SegmentKind::Index.list(ns.index_dir()).unwrap(), vec![0, 1]);

    // both values stay readable
    assert_eq!(ns.get(b"a").unwrap().unwrap().value, vec![1u8; 50]);
    assert_eq!(ns.get(b"b").unwrap().unwrap().value, vec![2u8; 50]);
}

#[test]
fn test_oversized_value_in_empty_segment_does_not_rotate() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let ns = open_namespace(&temp_dir, settings(KeyMode::UserKey, 64));

    ns.set(SetRequest::new(b"huge", &[0u8; 500])).unwrap();

    assert_eq!(ns.position().0, 0);
    assert!(ns.position().1 > SEGMENT_HEADER_SIZE + 500);
}

// =============================================================================
// Lock Tests
// =============================================================================

#[test]
fn test_locked_namespace_rejects_writes() {
    let (_temp, ns) = setup_temp_namespace(KeyMode::UserKey);
    ns.set(SetRequest::new(b"k", b"v")).unwrap();

    ns.update_meta(|meta| meta.writable = false).unwrap();

    let err = ns.set(SetRequest::new(b"k2", b"v")).unwrap_err();
    assert!(matches!(err, KvError::PermissionDenied(_)));
    assert!(matches!(ns.delete(b"k"), Err(KvError::PermissionDenied(_))));

    // reads still work
    assert_eq!(ns.get(b"k").unwrap().unwrap().value, b"v");

    ns.update_meta(|meta| meta.writable = true).unwrap();
    ns.set(SetRequest::new(b"k2", b"v")).unwrap();
}
