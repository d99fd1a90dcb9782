//! Index Recovery
//!
//! Replays index segments on startup. When a namespace has data segments
//! but no index at all, the index is rebuilt from a scan of the data log;
//! data segments newer than the last index segment are indexed the same way.

use std::path::Path;

use crate::config::StoreSettings;
use crate::data::DataRecovery;
use crate::error::{KvError, Result};
use crate::mode::KeyMode;
use crate::segment::{RecoveryResult, SegmentKind, SegmentReader};

use super::{IndexLocation, IndexRecord, IndexRequest, IndexStore};

/// Directory under the index directory where a rebuild is staged
const STAGING_DIR: &str = "rebuild.tmp";

/// Scans index segments and rebuilds lost indexes
pub struct IndexRecovery;

impl IndexRecovery {
    /// Visit every valid record of index segment `id` in order.
    ///
    /// Stops at the first truncated record or record CRC mismatch
    /// (`was_truncated`). A segment written under another key mode is a
    /// `Config` error: its keys mean something else.
    pub fn scan<F>(dir: &Path, id: u32, mode: KeyMode, mut visit: F) -> Result<RecoveryResult>
    where
        F: FnMut(IndexLocation, IndexRecord) -> Result<()>,
    {
        let mut segment = SegmentReader::open(SegmentKind::Index, dir, id)?;

        let tag = segment.header().tag;
        if tag != mode.tag() {
            let created = KeyMode::from_tag(tag)
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("unknown mode {}", tag));
            return Err(KvError::Config(format!(
                "index segment {} was created in {} mode, running in {} mode",
                id, created, mode
            )));
        }

        let mut result = RecoveryResult {
            valid_end: segment.position(),
            ..RecoveryResult::default()
        };

        loop {
            let offset = segment.position();
            match IndexRecord::read_from(segment.reader()) {
                Ok(Some(record)) => {
                    segment.advance(record.encoded_len());
                    result.records_recovered += 1;
                    result.valid_end = segment.position();
                    visit(IndexLocation { segment: id, offset }, record)?;
                }
                Ok(None) => break,
                Err(KvError::Corruption(reason)) => {
                    tracing::warn!(
                        "Index segment {}: stopping at offset {}: {}",
                        id,
                        offset,
                        reason
                    );
                    result.was_truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(result)
    }

    /// Rebuild an index from the data segments in `data_dir`.
    ///
    /// Index segment N is written for data segment N, so the pairing of
    /// segment ids holds for the rebuilt index too. Tombstones in the data
    /// log delete the keys they name.
    ///
    /// The index is built in a staging directory and its segments are moved
    /// into `index_dir` oldest first once complete. An interrupted rebuild
    /// leaves either no index (rebuilt again) or a prefix of it (completed
    /// by [`IndexRecovery::catch_up`]).
    pub fn rebuild(index_dir: &Path, data_dir: &Path, settings: &StoreSettings) -> Result<IndexStore> {
        let ids = SegmentKind::Data.list(data_dir)?;
        let first = ids.first().copied().unwrap_or(0);

        tracing::info!(
            "Rebuilding index in {:?} from {} data segments",
            index_dir,
            ids.len()
        );

        Self::discard_staging(index_dir)?;
        let staging = index_dir.join(STAGING_DIR);

        let mut store = IndexStore::create(&staging, settings, first)?;
        let mut rebuilt = 0u64;
        for &id in &ids {
            if id != store.current_segment_id() {
                store.rotate(id)?;
            }
            rebuilt += Self::replay_data_segment(&mut store, data_dir, id)?;
        }
        store.sync()?;
        drop(store);

        for id in SegmentKind::Index.list(&staging)? {
            std::fs::rename(
                SegmentKind::Index.path(&staging, id),
                SegmentKind::Index.path(index_dir, id),
            )?;
        }
        std::fs::remove_dir(&staging)?;

        let store = IndexStore::open(index_dir, settings)?;
        tracing::info!(
            "Index rebuilt: {} records, {} live keys",
            rebuilt,
            store.len()
        );

        Ok(store)
    }

    /// Index the data segments newer than the store's active segment.
    ///
    /// Data segments are only created ahead of their index segment by an
    /// interrupted rotation (empty segment) or an interrupted rebuild.
    /// Returns the number of data records replayed.
    pub fn catch_up(store: &mut IndexStore, data_dir: &Path) -> Result<u64> {
        let mut replayed = 0;

        for id in SegmentKind::Data.list(data_dir)? {
            if id <= store.current_segment_id() {
                continue;
            }
            tracing::warn!(
                "Index behind data segment {}, indexing it from the data log",
                id
            );
            store.rotate(id)?;
            replayed += Self::replay_data_segment(store, data_dir, id)?;
        }

        if replayed > 0 {
            store.sync()?;
        }
        Ok(replayed)
    }

    /// Remove what an interrupted rebuild left behind
    pub fn discard_staging(index_dir: &Path) -> Result<()> {
        let staging = index_dir.join(STAGING_DIR);
        if staging.exists() {
            tracing::warn!("Discarding unfinished index rebuild in {:?}", staging);
            std::fs::remove_dir_all(&staging)?;
        }
        Ok(())
    }

    fn replay_data_segment(store: &mut IndexStore, data_dir: &Path, id: u32) -> Result<u64> {
        let mut replayed = 0u64;

        let scanned = DataRecovery::scan(data_dir, id, |location, record| {
            if record.is_deleted() {
                if store.lookup(&record.key).is_some() {
                    store.delete(&record.key, location, record.timestamp)?;
                }
            } else {
                let existing = store.lookup(&record.key).cloned();
                let request = IndexRequest {
                    data: location,
                    length: record.value.len() as u32,
                    crc: record.crc,
                    flags: record.flags,
                };
                store.insert_or_update(&record.key, request, record.timestamp, existing)?;
            }
            replayed += 1;
            Ok(())
        });

        match scanned {
            Ok(_) => Ok(replayed),
            Err(KvError::Corruption(reason)) => {
                tracing::warn!("Skipping unreadable data segment {}: {}", id, reason);
                Ok(replayed)
            }
            Err(e) => Err(e),
        }
    }
}
