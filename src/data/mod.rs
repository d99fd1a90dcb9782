//! Data Log Module
//!
//! Append-only storage of value records, split into numbered segments.
//!
//! ## Responsibilities
//! - Frame and append value records
//! - CRC32 of every value, for dedup and corruption detection
//! - Rotation into the next numbered segment (driven by the namespace)
//! - Point reads by `{segment, offset}` and sequential scans for recovery
//!
//! ## Record Format (little-endian)
//! ```text
//! ┌──────────────┬─────────┬─────────────┬─────────┬───────────────┬─────────┬─────────┐
//! │ KeyLen (1)   │ Key     │ ValueLen (4)│Flags (1)│ Timestamp (8) │ CRC (4) │ Value   │
//! └──────────────┴─────────┴─────────────┴─────────┴───────────────┴─────────┴─────────┘
//! ```
//!
//! The CRC covers the value bytes only; the same CRC is stored in the index
//! and compared on overwrite to skip rewriting unchanged content.

mod log;
mod record;
mod recovery;

use std::time::{SystemTime, UNIX_EPOCH};

pub use log::{DataLog, DataRequest};
pub use record::{encoded_len, value_crc, DataRecord, MAX_VALUE_LENGTH, RECORD_FIXED_SIZE};
pub use recovery::DataRecovery;

/// Flag: record marks the deletion of its key
pub const FLAG_DELETED: u8 = 1 << 0;

/// Where a record lives in the data log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataLocation {
    /// Data segment id
    pub segment: u32,

    /// Offset of the record header within the segment (never 0)
    pub offset: u64,
}

/// Current time as unix seconds
pub fn timestamp_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
