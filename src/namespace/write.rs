//! Write Orchestrator
//!
//! `SET` in one namespace, in this order:
//!
//! ```text
//! validate ─► resolve key ─► quota ─► rotate? ─► allocate key
//!                                                    │
//!                        ┌───── crc == existing.crc ─┤
//!                        ▼                           ▼
//!                    Unchanged               append data ─► index ─► Stored
//! ```
//!
//! Everything before the data append only reads state, so a rejected write
//! leaves no trace. A failed data append leaves the index untouched; a
//! failed index write leaves an orphaned (unreachable) data record.

use crate::data::{timestamp_now, value_crc, DataLocation, DataRequest, MAX_VALUE_LENGTH};
use crate::error::{KvError, Result};
use crate::index::IndexRequest;
use crate::mode::{allocate, resolve, Resolution};

use super::{Namespace, Store};

/// One write
#[derive(Debug, Clone, Copy)]
pub struct SetRequest<'a> {
    /// Client key (may be empty in the generated-key modes)
    pub key: &'a [u8],
    pub value: &'a [u8],
    /// Timestamp to record instead of the current time
    pub timestamp: Option<i64>,
}

impl<'a> SetRequest<'a> {
    pub fn new(key: &'a [u8], value: &'a [u8]) -> Self {
        Self {
            key,
            value,
            timestamp: None,
        }
    }
}

/// Result of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// Value written under `key`
    Stored { key: Vec<u8>, location: DataLocation },

    /// Key already held the same content; nothing was written
    Unchanged { key: Vec<u8> },
}

impl SetOutcome {
    /// The resolved key
    pub fn key(&self) -> &[u8] {
        match self {
            SetOutcome::Stored { key, .. } | SetOutcome::Unchanged { key } => key,
        }
    }

    pub fn into_key(self) -> Vec<u8> {
        match self {
            SetOutcome::Stored { key, .. } | SetOutcome::Unchanged { key } => key,
        }
    }
}

impl Namespace {
    /// Store a value
    pub fn set(&self, request: SetRequest<'_>) -> Result<SetOutcome> {
        // Step 1: validate
        if request.key.len() > self.settings.max_key_length {
            return Err(KvError::InvalidArgument("Key too large".to_string()));
        }
        if request.value.len() > MAX_VALUE_LENGTH {
            return Err(KvError::InvalidArgument("Value too large".to_string()));
        }

        let maxsize = {
            let meta = self.meta.read();
            if !meta.writable {
                return Err(KvError::read_only());
            }
            meta.maxsize
        };

        let mut store = self.store.write();
        let Store { data, index } = &mut *store;

        // Step 2: resolve the key and fetch what it would replace
        let Resolution { slot, existing } = resolve(self.settings.key_mode, request.key, index)?;

        // Step 3: quota (the replaced value's length is given back)
        let length = request.value.len() as u64;
        if let Some(maxsize) = maxsize {
            let limit = maxsize + existing.as_ref().map_or(0, |e| e.length as u64);
            if index.datasize() + length > limit {
                tracing::debug!(
                    "Namespace {}: quota reached ({} + {} > {})",
                    self.name,
                    index.datasize(),
                    length,
                    limit
                );
                return Err(KvError::QuotaExceeded);
            }
        }

        // Step 4: rotation strictly before the write
        self.rotate_if_needed(data, index, length)?;

        // Step 5: concrete key (direct keys name the post-rotation segment)
        let key = allocate(slot, index)?;

        // Step 6: unchanged content is not written again
        let crc = value_crc(request.value);
        if let Some(existing) = &existing {
            if existing.crc == crc {
                tracing::debug!("Namespace {}: content unchanged, skipping write", self.name);
                return Ok(SetOutcome::Unchanged { key });
            }
        }

        // Step 7: data
        let timestamp = request.timestamp.unwrap_or_else(timestamp_now);
        let location = data.append(&DataRequest {
            key: &key,
            value: request.value,
            flags: 0,
            timestamp,
            crc: Some(crc),
        })?;

        // Step 8: index
        let request = IndexRequest {
            data: location,
            length: length as u32,
            crc,
            flags: 0,
        };
        index.insert_or_update(&key, request, timestamp, existing)?;

        tracing::debug!(
            "Namespace {}: stored {} bytes at segment {} offset {}",
            self.name,
            length,
            location.segment,
            location.offset
        );

        Ok(SetOutcome::Stored { key, location })
    }
}
