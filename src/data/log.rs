//! Data Log
//!
//! Appends value records to the active data segment and reads them back.

use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::{KvError, Result};
use crate::segment::{SegmentKind, SegmentReader, SegmentWriter, SEGMENT_HEADER_SIZE};

use super::record::{self, DataRecord};
use super::recovery::DataRecovery;
use super::{value_crc, DataLocation};

/// One append request
#[derive(Debug, Clone, Copy)]
pub struct DataRequest<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
    pub flags: u8,
    pub timestamp: i64,
    /// Precomputed CRC32 of `value`, if the caller already has it
    pub crc: Option<u32>,
}

/// Append-only data log of one namespace
pub struct DataLog {
    dir: PathBuf,
    writer: SegmentWriter,
}

impl DataLog {
    /// Open the data log with `segment_id` as the active segment.
    ///
    /// An existing active segment is scanned first and cut back to its last
    /// valid record, so new appends never follow a torn or corrupted one.
    /// Returns the valid end of the active segment alongside the log.
    pub fn open(dir: &Path, segment_id: u32, sync_strategy: SyncStrategy) -> Result<(Self, u64)> {
        let path = SegmentKind::Data.path(dir, segment_id);

        let valid_end = if path.exists() {
            match DataRecovery::verify(dir, segment_id) {
                Ok(result) => {
                    if result.was_truncated {
                        tracing::warn!(
                            "Data segment {} has an invalid tail after {} records",
                            segment_id,
                            result.records_recovered
                        );
                    }
                    Some(result.valid_end)
                }
                Err(KvError::Corruption(reason)) => {
                    // unreadable header: set the file aside and start over
                    tracing::warn!("Data segment {} unreadable ({}), moving aside", segment_id, reason);
                    std::fs::rename(&path, path.with_extension("corrupt"))?;
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let writer = SegmentWriter::open(
            SegmentKind::Data,
            dir,
            segment_id,
            0,
            sync_strategy,
            valid_end,
        )?;
        let end = writer.offset();

        Ok((
            Self {
                dir: dir.to_path_buf(),
                writer,
            },
            end,
        ))
    }

    /// Append a record to the active segment.
    ///
    /// Returns the segment and the offset of the record header. An I/O
    /// failure is reported as `StorageData`; nothing must be indexed then.
    pub fn append(&mut self, request: &DataRequest<'_>) -> Result<DataLocation> {
        let crc = request.crc.unwrap_or_else(|| value_crc(request.value));
        let bytes = record::encode(
            request.key,
            request.value,
            request.flags,
            request.timestamp,
            crc,
        );

        let offset = self.writer.append(&bytes).map_err(KvError::StorageData)?;
        debug_assert!(offset >= SEGMENT_HEADER_SIZE);

        Ok(DataLocation {
            segment: self.writer.id(),
            offset,
        })
    }

    /// Offset the next append would be written at
    pub fn next_offset(&self) -> u64 {
        self.writer.offset()
    }

    /// True when the active segment holds no record yet
    pub fn is_segment_empty(&self) -> bool {
        self.writer.offset() == SEGMENT_HEADER_SIZE
    }

    /// Close the active segment and open `next_segment_id`
    pub fn rotate(&mut self, next_segment_id: u32) -> Result<()> {
        self.writer.rotate(next_segment_id)
    }

    /// Active segment id
    pub fn segment_id(&self) -> u32 {
        self.writer.id()
    }

    /// Read the record at `location`, verifying its value CRC
    pub fn read(&self, location: DataLocation) -> Result<DataRecord> {
        let mut segment =
            SegmentReader::open_at(SegmentKind::Data, &self.dir, location.segment, location.offset)?;

        DataRecord::read_from(segment.reader())?.ok_or_else(|| {
            KvError::Corruption(format!(
                "no record at data segment {} offset {}",
                location.segment, location.offset
            ))
        })
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.sync().map_err(KvError::StorageData)
    }

    /// Total size of all data segments (bytes)
    pub fn disk_usage(&self) -> Result<u64> {
        let mut total = 0;
        for id in SegmentKind::Data.list(&self.dir)? {
            total += std::fs::metadata(SegmentKind::Data.path(&self.dir, id))?.len();
        }
        Ok(total)
    }

    /// Directory holding the segments
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
