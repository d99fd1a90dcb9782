//! Index record definitions

use std::io::Read;

use crate::data::{DataLocation, FLAG_DELETED};
use crate::error::{KvError, Result};
use crate::segment::{read_first_byte, read_record_part};

use super::IndexLocation;

/// Bytes after the key: DataId (4) + DataOff (8) + Length (4) + Flags (1) +
/// Timestamp (8) + CRC (4) + PrevId (4) + PrevOff (8)
const BODY_SIZE: usize = 41;

/// Bytes of an index record that do not depend on the key
/// (KeyLen + body + RecordCRC)
pub const INDEX_RECORD_FIXED_SIZE: u64 = 1 + BODY_SIZE as u64 + 4;

/// One record of the index log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub key: Vec<u8>,
    pub data: DataLocation,
    pub length: u32,
    pub crc: u32,
    pub flags: u8,
    pub timestamp: i64,
    pub previous: Option<IndexLocation>,
}

impl IndexRecord {
    pub fn is_deleted(&self) -> bool {
        self.flags & FLAG_DELETED != 0
    }

    /// On-disk size of this record
    pub fn encoded_len(&self) -> u64 {
        INDEX_RECORD_FIXED_SIZE + self.key.len() as u64
    }

    /// Serialize, appending a CRC32 of everything before it
    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.key.len() <= u8::MAX as usize);

        let (prev_segment, prev_offset) = match self.previous {
            Some(prev) => (prev.segment, prev.offset),
            None => (0, 0),
        };

        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        buf.push(self.key.len() as u8);
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.data.segment.to_le_bytes());
        buf.extend_from_slice(&self.data.offset.to_le_bytes());
        buf.extend_from_slice(&self.length.to_le_bytes());
        buf.push(self.flags);
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.crc.to_le_bytes());
        buf.extend_from_slice(&prev_segment.to_le_bytes());
        buf.extend_from_slice(&prev_offset.to_le_bytes());

        let record_crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&record_crc.to_le_bytes());
        buf
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` at a clean end of segment; a torn record or a
    /// record CRC mismatch is a `Corruption` error.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let key_len = match read_first_byte(reader)? {
            Some(len) => len,
            None => return Ok(None),
        };

        let mut key = vec![0u8; key_len as usize];
        read_record_part(reader, &mut key, "index key")?;

        let mut body = [0u8; BODY_SIZE];
        read_record_part(reader, &mut body, "index record")?;

        let mut stored = [0u8; 4];
        read_record_part(reader, &mut stored, "index record crc")?;
        let stored = u32::from_le_bytes(stored);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[key_len]);
        hasher.update(&key);
        hasher.update(&body);
        let computed = hasher.finalize();

        if computed != stored {
            return Err(KvError::Corruption(format!(
                "index record crc mismatch: stored {:08x}, computed {:08x}",
                stored, computed
            )));
        }

        let u32_at = |at: usize| u32::from_le_bytes([body[at], body[at + 1], body[at + 2], body[at + 3]]);
        let u64_at = |at: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&body[at..at + 8]);
            u64::from_le_bytes(bytes)
        };

        let prev_offset = u64_at(33);
        let previous = if prev_offset == 0 {
            None
        } else {
            Some(IndexLocation {
                segment: u32_at(29),
                offset: prev_offset,
            })
        };

        Ok(Some(Self {
            key,
            data: DataLocation {
                segment: u32_at(0),
                offset: u64_at(4),
            },
            length: u32_at(12),
            flags: body[16],
            timestamp: u64_at(17) as i64,
            crc: u32_at(25),
            previous,
        }))
    }
}
