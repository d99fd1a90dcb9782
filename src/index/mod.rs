//! Index Store Module
//!
//! Maps keys to the location of their current value in the data log.
//!
//! ## Responsibilities
//! - Key lookup, insertion, update and deletion
//! - Aggregate accounting (`datasize`, entry count)
//! - Id generation for the sequential and direct key modes
//! - Rotation of index segments in lockstep with the data log
//! - Replay on startup, or rebuild from the data log when no index exists
//!
//! ## Record Format (little-endian)
//!
//! Every mutation appends one record to the active index segment:
//! ```text
//! ┌────────────┬──────┬────────────┬─────────────┬───────────┐
//! │ KeyLen (1) │ Key  │ DataId (4) │ DataOff (8) │ Length (4)│
//! ├────────────┼──────┴────────┬───┴─────────────┼───────────┤
//! │ Flags (1)  │ Timestamp (8) │ CRC (4)         │ PrevId (4)│
//! ├────────────┴───────┬───────┴─────────────────┴───────────┤
//! │ PrevOff (8)        │ RecordCRC (4)                         │
//! └────────────────────┴───────────────────────────────────────┘
//! ```
//!
//! `PrevId/PrevOff` point at the index record this one supersedes (offset 0
//! means none), which chains every version of a key for `HISTORY`.

mod record;
mod recovery;
mod store;
mod table;

pub use record::{IndexRecord, INDEX_RECORD_FIXED_SIZE};
pub use recovery::IndexRecovery;
pub use store::IndexStore;
pub use table::IndexTable;

use crate::data::{DataLocation, FLAG_DELETED};

/// Where an index record lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexLocation {
    /// Index segment id
    pub segment: u32,

    /// Offset of the record within the segment (never 0)
    pub offset: u64,
}

/// A live key and where its current value is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: Vec<u8>,

    /// Data segment and offset of the value record
    pub data: DataLocation,

    /// Value length
    pub length: u32,

    /// CRC32 of the value
    pub crc: u32,

    pub flags: u8,

    /// Unix seconds
    pub timestamp: i64,

    /// Index record describing this version
    pub location: IndexLocation,

    /// Index record of the version this one replaced
    pub previous: Option<IndexLocation>,
}

impl IndexEntry {
    pub fn is_deleted(&self) -> bool {
        self.flags & FLAG_DELETED != 0
    }
}

/// Location fields for an insert or update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRequest {
    pub data: DataLocation,
    pub length: u32,
    pub crc: u32,
    pub flags: u8,
}
