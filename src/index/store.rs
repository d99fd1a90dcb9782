//! Index Store
//!
//! The in-memory table of live keys plus the append-only index segments
//! that make it durable.

use std::path::{Path, PathBuf};

use crate::config::StoreSettings;
use crate::data::{DataLocation, FLAG_DELETED};
use crate::error::{KvError, Result};
use crate::mode::{parse_sequential_key, DirectKey, KeyMode};
use crate::segment::{SegmentKind, SegmentReader, SegmentWriter};

use super::recovery::IndexRecovery;
use super::{IndexEntry, IndexLocation, IndexRecord, IndexRequest, IndexTable};

/// Replayable state: everything derived from index records
#[derive(Debug, Default)]
pub(super) struct IndexState {
    pub(super) table: IndexTable,

    /// Next sequential id (u64 so that u32::MAX can be detected as used)
    next_id: u64,

    /// Segment the object id counter belongs to
    objectid_segment: u32,

    /// Next object id within `objectid_segment`
    next_objectid: u64,
}

impl IndexState {
    /// Advance the id generators past a key seen in the index
    fn track_ids(&mut self, mode: KeyMode, key: &[u8]) {
        match mode {
            KeyMode::Sequential | KeyMode::FixedBlock => {
                if let Some(id) = parse_sequential_key(key) {
                    self.next_id = self.next_id.max(id as u64 + 1);
                }
            }
            KeyMode::DirectKey => {
                if let Some(direct) = DirectKey::decode(key) {
                    if direct.segment > self.objectid_segment {
                        self.objectid_segment = direct.segment;
                        self.next_objectid = direct.object as u64 + 1;
                    } else if direct.segment == self.objectid_segment {
                        self.next_objectid = self.next_objectid.max(direct.object as u64 + 1);
                    }
                }
            }
            KeyMode::UserKey => {}
        }
    }

    /// Apply one index record (replay path)
    pub(super) fn apply(&mut self, mode: KeyMode, record: IndexRecord, location: IndexLocation) {
        self.track_ids(mode, &record.key);

        if record.is_deleted() {
            self.table.remove(&record.key);
            return;
        }

        self.table.upsert(IndexEntry {
            key: record.key,
            data: record.data,
            length: record.length,
            crc: record.crc,
            flags: record.flags,
            timestamp: record.timestamp,
            location,
            previous: record.previous,
        });
    }
}

/// Index of one namespace
pub struct IndexStore {
    dir: PathBuf,
    mode: KeyMode,
    writer: SegmentWriter,
    state: IndexState,
}

impl IndexStore {
    /// Open the index, replaying every existing segment.
    ///
    /// With no segment on disk a fresh segment 0 is created.
    pub fn open(dir: &Path, settings: &StoreSettings) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let ids = SegmentKind::Index.list(dir)?;

        let active = match ids.last() {
            Some(&id) => id,
            None => return Self::create(dir, settings, 0),
        };

        let mode = settings.key_mode;
        let mut state = IndexState::default();
        let mut active_end = None;
        let mut recovered = 0;

        for &id in &ids {
            let scanned = IndexRecovery::scan(dir, id, mode, |location, record| {
                state.apply(mode, record, location);
                Ok(())
            });

            match scanned {
                Ok(result) => {
                    recovered += result.records_recovered;
                    if result.was_truncated {
                        tracing::warn!(
                            "Index segment {}: replay stopped after {} records",
                            id,
                            result.records_recovered
                        );
                    }
                    if id == active {
                        active_end = Some(result.valid_end);
                    }
                }
                Err(KvError::Corruption(reason)) => {
                    tracing::warn!("Index segment {} unreadable: {}", id, reason);
                    if id == active {
                        let path = SegmentKind::Index.path(dir, id);
                        std::fs::rename(&path, path.with_extension("corrupt"))?;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "Index replay: {} segments, {} records, {} live keys",
            ids.len(),
            recovered,
            state.table.len()
        );

        let writer = SegmentWriter::open(
            SegmentKind::Index,
            dir,
            active,
            mode.tag(),
            settings.sync_strategy,
            active_end,
        )?;

        Ok(Self {
            dir: dir.to_path_buf(),
            mode,
            writer,
            state,
        })
    }

    /// Create an empty index whose first segment is `segment_id`
    pub fn create(dir: &Path, settings: &StoreSettings, segment_id: u32) -> Result<Self> {
        let writer = SegmentWriter::open(
            SegmentKind::Index,
            dir,
            segment_id,
            settings.key_mode.tag(),
            settings.sync_strategy,
            None,
        )?;

        Ok(Self {
            dir: dir.to_path_buf(),
            mode: settings.key_mode,
            writer,
            state: IndexState {
                objectid_segment: segment_id,
                ..IndexState::default()
            },
        })
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Entry of a live key
    pub fn lookup(&self, key: &[u8]) -> Option<&IndexEntry> {
        self.state.table.get(key)
    }

    /// Sum of value lengths of live entries
    pub fn datasize(&self) -> u64 {
        self.state.table.datasize()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.state.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.table.is_empty()
    }

    /// Live entries in insertion order
    pub fn table(&self) -> &IndexTable {
        &self.state.table
    }

    /// Every recorded version of a key, newest first, following the
    /// previous-record chain through the index segments.
    pub fn history(&self, key: &[u8]) -> Result<Vec<IndexRecord>> {
        let entry = self.lookup(key).ok_or_else(KvError::key_not_found)?;

        let mut versions = Vec::new();
        let mut next = Some(entry.location);

        while let Some(location) = next {
            let record = self.read_record(location)?;
            next = match record.previous {
                // the chain only ever points backwards
                Some(prev) if (prev.segment, prev.offset) < (location.segment, location.offset) => {
                    Some(prev)
                }
                _ => None,
            };
            versions.push(record);
        }

        Ok(versions)
    }

    /// Read the index record at `location`
    pub fn read_record(&self, location: IndexLocation) -> Result<IndexRecord> {
        let mut segment =
            SegmentReader::open_at(SegmentKind::Index, &self.dir, location.segment, location.offset)?;

        IndexRecord::read_from(segment.reader())?.ok_or_else(|| {
            KvError::Corruption(format!(
                "no record at index segment {} offset {}",
                location.segment, location.offset
            ))
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert a new key or update an existing one.
    ///
    /// `existing` is the caller's lookup of the same key. The record is
    /// always written; on failure (`StorageIndex`) nothing in memory changes.
    pub fn insert_or_update(
        &mut self,
        key: &[u8],
        request: IndexRequest,
        timestamp: i64,
        existing: Option<IndexEntry>,
    ) -> Result<IndexEntry> {
        let previous = existing
            .map(|e| e.location)
            .or_else(|| self.lookup(key).map(|e| e.location));

        let record = IndexRecord {
            key: key.to_vec(),
            data: request.data,
            length: request.length,
            crc: request.crc,
            flags: request.flags,
            timestamp,
            previous,
        };

        let location = self.append(&record)?;

        let entry = IndexEntry {
            key: record.key,
            data: record.data,
            length: record.length,
            crc: record.crc,
            flags: record.flags,
            timestamp,
            location,
            previous,
        };

        self.state.track_ids(self.mode, key);
        self.state.table.upsert(entry.clone());

        Ok(entry)
    }

    /// Delete a key, writing a tombstone record that points at the
    /// deletion marker in the data log. Returns the removed entry.
    pub fn delete(&mut self, key: &[u8], data: DataLocation, timestamp: i64) -> Result<IndexEntry> {
        let entry = self.lookup(key).ok_or_else(KvError::key_not_found)?;

        let record = IndexRecord {
            key: key.to_vec(),
            data,
            length: 0,
            crc: 0,
            flags: FLAG_DELETED,
            timestamp,
            previous: Some(entry.location),
        };

        self.append(&record)?;

        self.state
            .table
            .remove(key)
            .ok_or_else(KvError::key_not_found)
    }

    /// Delete every entry whose value lies at or beyond `end` in data
    /// segment `segment` (values lost with a truncated data tail).
    pub fn drop_beyond(&mut self, segment: u32, end: u64, timestamp: i64) -> Result<usize> {
        let lost: Vec<Vec<u8>> = self
            .state
            .table
            .iter()
            .filter(|e| e.data.segment == segment && e.data.offset >= end)
            .map(|e| e.key.clone())
            .collect();

        for key in &lost {
            tracing::warn!("Dropping index entry whose data record was lost: {:02x?}", key);
            self.delete(key, DataLocation { segment, offset: 0 }, timestamp)?;
        }

        Ok(lost.len())
    }

    fn append(&mut self, record: &IndexRecord) -> Result<IndexLocation> {
        let offset = self
            .writer
            .append(&record.encode())
            .map_err(KvError::StorageIndex)?;

        Ok(IndexLocation {
            segment: self.writer.id(),
            offset,
        })
    }

    // =========================================================================
    // Id generation and rotation
    // =========================================================================

    /// Next sequential id; never hands out the same id twice
    pub fn next_id(&mut self) -> Result<u32> {
        let id = u32::try_from(self.state.next_id)
            .map_err(|_| KvError::InvalidArgument("Sequential key space exhausted".to_string()))?;
        self.state.next_id += 1;
        Ok(id)
    }

    /// Active index segment id (paired with the active data segment)
    pub fn current_segment_id(&self) -> u32 {
        self.writer.id()
    }

    /// Next object id within the active segment
    pub fn next_objectid(&mut self) -> Result<u32> {
        let segment = self.writer.id();
        if self.state.objectid_segment != segment {
            self.state.objectid_segment = segment;
            self.state.next_objectid = 0;
        }

        let id = u32::try_from(self.state.next_objectid)
            .map_err(|_| KvError::InvalidArgument("Object id space exhausted".to_string()))?;
        self.state.next_objectid += 1;
        Ok(id)
    }

    /// Close the active segment and open `next_segment_id`; must be called
    /// with the same id as the data log rotation.
    pub fn rotate(&mut self, next_segment_id: u32) -> Result<()> {
        self.writer.rotate(next_segment_id)?;
        self.state.objectid_segment = next_segment_id;
        self.state.next_objectid = 0;
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.sync().map_err(KvError::StorageIndex)
    }

    /// Total size of all index segments (bytes)
    pub fn disk_usage(&self) -> Result<u64> {
        let mut total = 0;
        for id in SegmentKind::Index.list(&self.dir)? {
            total += std::fs::metadata(SegmentKind::Index.path(&self.dir, id))?.len();
        }
        Ok(total)
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }
}
