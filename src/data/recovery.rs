//! Data Recovery
//!
//! Sequential scans of data segments: used to find the valid end of the
//! active segment and to rebuild a lost index.

use std::path::Path;

use crate::error::{KvError, Result};
use crate::segment::{RecoveryResult, SegmentKind, SegmentReader};

use super::{DataLocation, DataRecord};

/// Scans data segments record by record
pub struct DataRecovery;

impl DataRecovery {
    /// Visit every valid record of segment `id` in order.
    ///
    /// The scan stops at the first truncated or corrupted record; everything
    /// after it is treated as if the log ended there (`was_truncated`).
    /// A segment whose header cannot be read is reported as `Corruption`.
    pub fn scan<F>(dir: &Path, id: u32, mut visit: F) -> Result<RecoveryResult>
    where
        F: FnMut(DataLocation, DataRecord) -> Result<()>,
    {
        let mut segment = SegmentReader::open(SegmentKind::Data, dir, id)?;
        let mut result = RecoveryResult {
            valid_end: segment.position(),
            ..RecoveryResult::default()
        };

        loop {
            let offset = segment.position();
            match DataRecord::read_from(segment.reader()) {
                Ok(Some(record)) => {
                    segment.advance(record.encoded_len());
                    result.records_recovered += 1;
                    result.valid_end = segment.position();
                    visit(DataLocation { segment: id, offset }, record)?;
                }
                Ok(None) => break,
                Err(KvError::Corruption(reason)) => {
                    tracing::warn!(
                        "Data segment {}: stopping at offset {}: {}",
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

    /// Verify integrity of a data segment without visiting records
    pub fn verify(dir: &Path, id: u32) -> Result<RecoveryResult> {
        Self::scan(dir, id, |_, _| Ok(()))
    }
}
