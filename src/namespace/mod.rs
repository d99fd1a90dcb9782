//! Namespace Module
//!
//! A namespace pairs one data log with one index store and owns the write
//! path that keeps them consistent.
//!
//! ## Concurrency Model
//!
//! ```text
//!            set / delete / rotation            get / exists / scan
//!                      │                                │
//!                      ▼                                ▼
//!            ┌──────────────────┐            ┌──────────────────┐
//!            │  store.write()   │            │   store.read()   │
//!            └────────┬─────────┘            └────────┬─────────┘
//!                     └───────────────┬───────────────┘
//!                                     ▼
//!                     ┌───────────────────────────────┐
//!                     │ Store { DataLog, IndexStore } │
//!                     └───────────────────────────────┘
//! ```
//!
//! Writes of one namespace are serialized; reads run concurrently with each
//! other. Point reads open their own file handle, so they never disturb the
//! writer. Namespaces share nothing.

mod manager;
mod meta;
mod write;

pub use manager::{validate_name, NamespaceManager, DEFAULT_NAMESPACE};
pub use meta::{NamespaceMeta, META_FILENAME};
pub use write::{SetOutcome, SetRequest};

use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::config::StoreSettings;
use crate::data::{timestamp_now, DataLog, DataRequest, FLAG_DELETED};
use crate::error::{KvError, Result};
use crate::index::{IndexRecovery, IndexStore};
use crate::mode::KeyMode;
use crate::segment::SegmentKind;

/// The two logs of a namespace, always locked together
pub(crate) struct Store {
    pub(crate) data: DataLog,
    pub(crate) index: IndexStore,
}

/// A value read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: Vec<u8>,
    pub timestamp: i64,
    pub flags: u8,
}

/// One version of a key, as returned by `history`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub timestamp: i64,
    pub flags: u8,
    pub value: Vec<u8>,
}

/// One step of a key walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub key: Vec<u8>,
    pub length: u32,
    pub timestamp: i64,
}

/// Snapshot of namespace statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub name: String,
    pub entries: usize,
    pub datasize: u64,
    pub meta: NamespaceMeta,
    pub index_disk_usage: u64,
    pub data_disk_usage: u64,
    pub mode: KeyMode,
    pub data_segment: u32,
    pub next_offset: u64,
}

/// One namespace: a data log, its index, and its settings
pub struct Namespace {
    name: String,
    data_dir: PathBuf,
    index_dir: PathBuf,
    settings: StoreSettings,
    meta: RwLock<NamespaceMeta>,
    store: RwLock<Store>,
}

impl Namespace {
    /// Open or create namespace `name` under the given roots.
    ///
    /// On startup:
    /// 1. Load metadata (defaults when absent)
    /// 2. Replay the index, or rebuild it from the data log if it is missing
    /// 3. Open the data log at the index's active segment, cutting off an
    ///    invalid tail
    /// 4. Drop index entries whose data was cut off
    pub fn open(name: &str, data_root: &Path, index_root: &Path, settings: StoreSettings) -> Result<Self> {
        let data_dir = data_root.join(name);
        let index_dir = index_root.join(name);
        std::fs::create_dir_all(&data_dir)?;
        std::fs::create_dir_all(&index_dir)?;

        let meta = match NamespaceMeta::load(&index_dir)? {
            Some(meta) => meta,
            None => {
                let meta = NamespaceMeta::default();
                meta.save(&index_dir)?;
                meta
            }
        };

        IndexRecovery::discard_staging(&index_dir)?;
        let index_ids = SegmentKind::Index.list(&index_dir)?;
        let data_ids = SegmentKind::Data.list(&data_dir)?;

        let mut index = if index_ids.is_empty() && !data_ids.is_empty() {
            IndexRecovery::rebuild(&index_dir, &data_dir, &settings)?
        } else {
            IndexStore::open(&index_dir, &settings)?
        };

        // an interrupted rotation or rebuild leaves the data log ahead
        let caught_up = IndexRecovery::catch_up(&mut index, &data_dir)?;
        if caught_up > 0 {
            tracing::warn!("Namespace {}: indexed {} records from the data log", name, caught_up);
        }
        let active = index.current_segment_id();

        let (data, valid_end) = DataLog::open(&data_dir, active, settings.sync_strategy)?;

        let dropped = index.drop_beyond(active, valid_end, timestamp_now())?;
        if dropped > 0 {
            tracing::warn!("Namespace {}: {} entries lost with the data tail", name, dropped);
        }

        tracing::info!(
            "Namespace {} opened: {} entries, {} bytes, segment {}",
            name,
            index.len(),
            index.datasize(),
            active
        );

        Ok(Self {
            name: name.to_string(),
            data_dir,
            index_dir,
            settings,
            meta: RwLock::new(meta),
            store: RwLock::new(Store { data, index }),
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get the current value of a key
    pub fn get(&self, key: &[u8]) -> Result<Option<StoredValue>> {
        let store = self.store.read();

        let entry = match store.index.lookup(key) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let record = store.data.read(entry.data)?;
        if record.key != key {
            return Err(KvError::Corruption(format!(
                "data record at segment {} offset {} belongs to another key",
                entry.data.segment, entry.data.offset
            )));
        }

        Ok(Some(StoredValue {
            value: record.value,
            timestamp: entry.timestamp,
            flags: entry.flags,
        }))
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        self.store.read().index.lookup(key).is_some()
    }

    /// Verify the stored value of a key against its CRC.
    ///
    /// `None` when the key does not exist.
    pub fn check(&self, key: &[u8]) -> Result<Option<bool>> {
        let store = self.store.read();

        let entry = match store.index.lookup(key) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        match store.data.read(entry.data) {
            Ok(record) => Ok(Some(record.crc == entry.crc && record.key == key)),
            Err(KvError::Corruption(reason)) => {
                tracing::warn!("Namespace {}: check failed: {}", self.name, reason);
                Ok(Some(false))
            }
            Err(e) => Err(e),
        }
    }

    /// Timestamp of the current version of a key
    pub fn keytime(&self, key: &[u8]) -> Option<i64> {
        self.store.read().index.lookup(key).map(|e| e.timestamp)
    }

    /// Every version of a key, newest first
    pub fn history(&self, key: &[u8]) -> Result<Vec<Version>> {
        let store = self.store.read();

        store
            .index
            .history(key)?
            .into_iter()
            .map(|record| {
                let data = store.data.read(record.data)?;
                Ok(Version {
                    timestamp: record.timestamp,
                    flags: record.flags,
                    value: data.value,
                })
            })
            .collect()
    }

    /// Key following `cursor` in insertion order (the first key without a
    /// cursor). `Ok(None)` at the end of the namespace.
    pub fn scan(&self, cursor: Option<&[u8]>) -> Result<Option<ScanEntry>> {
        let store = self.store.read();
        let table = store.index.table();

        let entry = match cursor {
            None => table.first(),
            Some(cursor) => {
                if !table.contains(cursor) {
                    return Err(KvError::InvalidArgument("Invalid cursor".to_string()));
                }
                table.after(cursor)
            }
        };

        Ok(entry.map(|e| ScanEntry {
            key: e.key.clone(),
            length: e.length,
            timestamp: e.timestamp,
        }))
    }

    /// Number of live keys
    pub fn entries(&self) -> usize {
        self.store.read().index.len()
    }

    /// Sum of live value lengths
    pub fn datasize(&self) -> u64 {
        self.store.read().index.datasize()
    }

    /// Active segment id and where the next append lands
    pub fn position(&self) -> (u32, u64) {
        let store = self.store.read();
        (store.data.segment_id(), store.data.next_offset())
    }

    pub fn info(&self) -> Result<NamespaceInfo> {
        let store = self.store.read();

        Ok(NamespaceInfo {
            name: self.name.clone(),
            entries: store.index.len(),
            datasize: store.index.datasize(),
            meta: self.meta(),
            index_disk_usage: store.index.disk_usage()?,
            data_disk_usage: store.data.disk_usage()?,
            mode: self.settings.key_mode,
            data_segment: store.data.segment_id(),
            next_offset: store.data.next_offset(),
        })
    }

    // =========================================================================
    // Deletes
    // =========================================================================

    /// Delete a key.
    ///
    /// A tombstone goes to the data log first, then the index record; the
    /// key's `length` is released from `datasize`.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        if !self.is_writable() {
            return Err(KvError::read_only());
        }

        let mut store = self.store.write();
        let Store { data, index } = &mut *store;

        if index.lookup(key).is_none() {
            return Err(KvError::key_not_found());
        }

        self.rotate_if_needed(data, index, 0)?;

        let timestamp = timestamp_now();
        let location = data.append(&DataRequest {
            key,
            value: &[],
            flags: FLAG_DELETED,
            timestamp,
            crc: None,
        })?;
        index.delete(key, location, timestamp)?;

        tracing::debug!("Namespace {}: deleted key ({} bytes)", self.name, key.len());
        Ok(())
    }

    // =========================================================================
    // Rotation
    // =========================================================================

    /// Rotate both logs when `incoming` more bytes would overflow the
    /// active data segment. An empty segment is never rotated away.
    pub(crate) fn rotate_if_needed(&self, data: &mut DataLog, index: &mut IndexStore, incoming: u64) -> Result<bool> {
        if data.is_segment_empty() || data.next_offset() + incoming <= self.settings.segment_size {
            return Ok(false);
        }

        let next = data.segment_id() + 1;
        data.rotate(next)?;
        index.rotate(next)?;

        tracing::info!("Namespace {}: rotated to segment {}", self.name, next);
        Ok(true)
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub fn meta(&self) -> NamespaceMeta {
        self.meta.read().clone()
    }

    /// Change the metadata and persist it before it takes effect
    pub fn update_meta<F>(&self, change: F) -> Result<NamespaceMeta>
    where
        F: FnOnce(&mut NamespaceMeta),
    {
        let mut meta = self.meta.write();
        let mut updated = meta.clone();
        change(&mut updated);
        updated.save(&self.index_dir)?;
        *meta = updated.clone();
        Ok(updated)
    }

    pub fn is_writable(&self) -> bool {
        self.meta.read().writable
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Force sync both logs to disk
    pub fn sync(&self) -> Result<()> {
        let mut store = self.store.write();
        store.data.sync()?;
        store.index.sync()
    }
}
