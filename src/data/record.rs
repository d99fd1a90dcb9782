//! Data record definitions
//!
//! Defines the framing of individual value records.

use std::io::Read;

use crate::error::{KvError, Result};
use crate::segment::{read_first_byte, read_record_part};

use super::FLAG_DELETED;

/// Bytes of a record that do not depend on key or value:
/// KeyLen (1) + ValueLen (4) + Flags (1) + Timestamp (8) + CRC (4)
pub const RECORD_FIXED_SIZE: u64 = 18;

/// Largest value a record may carry (512 MB, the protocol's bulk limit)
pub const MAX_VALUE_LENGTH: usize = 512 * 1024 * 1024;

/// A single record of the data log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub flags: u8,
    /// Unix seconds
    pub timestamp: i64,
    /// CRC32 of `value`
    pub crc: u32,
}

/// CRC32 of a value
pub fn value_crc(value: &[u8]) -> u32 {
    crc32fast::hash(value)
}

/// On-disk size of a record with the given key and value lengths
pub fn encoded_len(key_len: usize, value_len: usize) -> u64 {
    RECORD_FIXED_SIZE + key_len as u64 + value_len as u64
}

/// Encode a record. Key length must fit in one byte (checked by callers).
pub(crate) fn encode(key: &[u8], value: &[u8], flags: u8, timestamp: i64, crc: u32) -> Vec<u8> {
    debug_assert!(key.len() <= u8::MAX as usize);

    let mut buf = Vec::with_capacity(encoded_len(key.len(), value.len()) as usize);
    buf.push(key.len() as u8);
    buf.extend_from_slice(key);
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.push(flags);
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(value);
    buf
}

impl DataRecord {
    /// Serialize to the on-disk framing
    pub fn encode(&self) -> Vec<u8> {
        encode(&self.key, &self.value, self.flags, self.timestamp, self.crc)
    }

    /// On-disk size of this record
    pub fn encoded_len(&self) -> u64 {
        encoded_len(self.key.len(), self.value.len())
    }

    pub fn is_deleted(&self) -> bool {
        self.flags & FLAG_DELETED != 0
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` at a clean end of segment, and a `Corruption`
    /// error for a truncated record or a value whose CRC does not match.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let key_len = match read_first_byte(reader)? {
            Some(len) => len as usize,
            None => return Ok(None),
        };

        let mut key = vec![0u8; key_len];
        read_record_part(reader, &mut key, "record key")?;

        let mut fixed = [0u8; 17];
        read_record_part(reader, &mut fixed, "record header")?;

        let value_len = u32::from_le_bytes([fixed[0], fixed[1], fixed[2], fixed[3]]) as usize;
        let flags = fixed[4];
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&fixed[5..13]);
        let timestamp = i64::from_le_bytes(timestamp);
        let crc = u32::from_le_bytes([fixed[13], fixed[14], fixed[15], fixed[16]]);

        if value_len > MAX_VALUE_LENGTH {
            return Err(KvError::Corruption(format!(
                "record value length {} exceeds limit",
                value_len
            )));
        }

        let mut value = vec![0u8; value_len];
        read_record_part(reader, &mut value, "record value")?;

        let computed = value_crc(&value);
        if computed != crc {
            return Err(KvError::Corruption(format!(
                "value crc mismatch: stored {:08x}, computed {:08x}",
                crc, computed
            )));
        }

        Ok(Some(Self {
            key,
            value,
            flags,
            timestamp,
            crc,
        }))
    }
}
