//! Tests for DataLog
//!
//! These tests verify:
//! - Segment creation with a header (offset 0 never used)
//! - Append offsets and read-back of every record field
//! - Rotation into the next segment, old segment left readable
//! - Reopening continues after the last record

use std::path::Path;

use tempfile::TempDir;
use zerokv::config::SyncStrategy;
use zerokv::data::{encoded_len, value_crc, DataLocation, DataLog, DataRequest, FLAG_DELETED};
use zerokv::segment::{SegmentKind, SEGMENT_HEADER_SIZE};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_log() -> (TempDir, DataLog) {
    let temp_dir = TempDir::new().unwrap();
    let (log, _) = DataLog::open(temp_dir.path(), 0, SyncStrategy::EveryWrite).unwrap();
    (temp_dir, log)
}

fn request<'a>(key: &'a [u8], value: &'a [u8]) -> DataRequest<'a> {
    DataRequest {
        key,
        value,
        flags: 0,
        timestamp: 1_700_000_000,
        crc: None,
    }
}

fn file_len(dir: &Path, id: u32) -> u64 {
    std::fs::metadata(SegmentKind::Data.path(dir, id)).unwrap().len()
}

// =============================================================================
// Open / Append Tests
// =============================================================================

#[test]
fn test_open_creates_segment_with_header() {
    let temp_dir = TempDir::new().unwrap();
    let (log, end) = DataLog::open(temp_dir.path(), 0, SyncStrategy::EveryWrite).unwrap();

    assert_eq!(end, SEGMENT_HEADER_SIZE);
    assert_eq!(log.next_offset(), SEGMENT_HEADER_SIZE);
    assert!(log.is_segment_empty());
    assert_eq!(file_len(temp_dir.path(), 0), SEGMENT_HEADER_SIZE);
}

#[test]
fn test_append_offsets_follow_each_other() {
    let (_temp, mut log) = setup_temp_log();

    let first = log.append(&request(b"a", b"hello")).unwrap();
    let second = log.append(&request(b"bb", b"world!")).unwrap();

    assert_eq!(first, DataLocation { segment: 0, offset: SEGMENT_HEADER_SIZE });
    assert_eq!(second.offset, SEGMENT_HEADER_SIZE + encoded_len(1, 5));
    assert_eq!(log.next_offset(), second.offset + encoded_len(2, 6));
    assert!(!log.is_segment_empty());
}

#[test]
fn test_read_back_all_fields() {
    let (_temp, mut log) = setup_temp_log();

    let location = log.append(&request(b"key", b"some value")).unwrap();
    let record = log.read(location).unwrap();

    assert_eq!(record.key, b"key");
    assert_eq!(record.value, b"some value");
    assert_eq!(record.flags, 0);
    assert_eq!(record.timestamp, 1_700_000_000);
    assert_eq!(record.crc, value_crc(b"some value"));
    assert!(!record.is_deleted());
}

#[test]
fn test_precomputed_crc_is_stored() {
    let (_temp, mut log) = setup_temp_log();

    let crc = value_crc(b"payload");
    let location = log
        .append(&DataRequest {
            crc: Some(crc),
            ..request(b"k", b"payload")
        })
        .unwrap();

    assert_eq!(log.read(location).unwrap().crc, crc);
}

#[test]
fn test_tombstone_record() {
    let (_temp, mut log) = setup_temp_log();

    let location = log
        .append(&DataRequest {
            flags: FLAG_DELETED,
            ..request(b"gone", b"")
        })
        .unwrap();

    let record = log.read(location).unwrap();
    assert!(record.is_deleted());
    assert!(record.value.is_empty());
}

#[test]
fn test_empty_key_and_binary_value() {
    let (_temp, mut log) = setup_temp_log();
    let value: Vec<u8> = (0..=255u8).collect();

    let location = log.append(&request(b"", &value)).unwrap();
    let record = log.read(location).unwrap();

    assert!(record.key.is_empty());
    assert_eq!(record.value, value);
}

#[test]
fn test_read_at_end_of_segment_fails() {
    let (_temp, mut log) = setup_temp_log();
    log.append(&request(b"a", b"1")).unwrap();

    let past_end = DataLocation {
        segment: 0,
        offset: log.next_offset(),
    };
    assert!(log.read(past_end).is_err());
}

// =============================================================================
// Rotation Tests
// =============================================================================

#[test]
fn test_rotate_opens_next_segment() {
    let (temp, mut log) = setup_temp_log();

    let old = log.append(&request(b"old", b"value")).unwrap();
    let old_len = file_len(temp.path(), 0);

    log.rotate(1).unwrap();

    assert_eq!(log.segment_id(), 1);
    assert_eq!(log.next_offset(), SEGMENT_HEADER_SIZE);
    assert!(log.is_segment_empty());

    let new = log.append(&request(b"new", b"value")).unwrap();
    assert_eq!(new, DataLocation { segment: 1, offset: SEGMENT_HEADER_SIZE });

    // previous segment untouched and still readable
    assert_eq!(file_len(temp.path(), 0), old_len);
    assert_eq!(log.read(old).unwrap().key, b"old");
    assert_eq!(log.read(new).unwrap().key, b"new");

    assert_eq!(SegmentKind::Data.list(temp.path()).unwrap(), vec![0, 1]);
}

#[test]
fn test_disk_usage_counts_all_segments() {
    let (_temp, mut log) = setup_temp_log();

    log.append(&request(b"a", b"12345")).unwrap();
    log.rotate(1).unwrap();
    log.append(&request(b"b", b"123")).unwrap();

    let expected = 2 * SEGMENT_HEADER_SIZE + encoded_len(1, 5) + encoded_len(1, 3);
    assert_eq!(log.disk_usage().unwrap(), expected);
}

// =============================================================================
// Reopen Tests
// =============================================================================

#[test]
fn test_reopen_continues_after_last_record() {
    let temp_dir = TempDir::new().unwrap();

    let end = {
        let (mut log, _) = DataLog::open(temp_dir.path(), 0, SyncStrategy::EveryWrite).unwrap();
        log.append(&request(b"a", b"one")).unwrap();
        log.append(&request(b"b", b"two")).unwrap();
        log.next_offset()
    };

    let (mut log, valid_end) = DataLog::open(temp_dir.path(), 0, SyncStrategy::EveryWrite).unwrap();
    assert_eq!(valid_end, end);

    let location = log.append(&request(b"c", b"three")).unwrap();
    assert_eq!(location.offset, end);
    assert_eq!(log.read(location).unwrap().value, b"three");
}
