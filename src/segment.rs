//! Segment files
//!
//! Both the data log and the index store are sequences of numbered,
//! append-only segment files. This module owns what they have in common:
//! file naming, the segment header, appending with a sync strategy, and
//! opening a segment for sequential reading.
//!
//! ## Segment Header (19 bytes, little-endian)
//! ```text
//! ┌──────────┬────────────┬─────────┬──────────────┬─────────┐
//! │Magic (4) │Version (2) │ Id (4)  │ Created (8)  │ Tag (1) │
//! └──────────┴────────────┴─────────┴──────────────┴─────────┘
//! ```
//!
//! Records start right after the header, so offset 0 never addresses a
//! record and can be used as a "no location" marker.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::data::timestamp_now;
use crate::error::{KvError, Result};

/// Size of the header at the start of every segment
pub const SEGMENT_HEADER_SIZE: u64 = 19;

/// Current segment format version
pub const SEGMENT_VERSION: u16 = 1;

/// Which log a segment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Data,
    Index,
}

impl SegmentKind {
    fn magic(self) -> &'static [u8; 4] {
        match self {
            SegmentKind::Data => b"ZKVD",
            SegmentKind::Index => b"ZKVI",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            SegmentKind::Data => "data_",
            SegmentKind::Index => "index_",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            SegmentKind::Data => "dat",
            SegmentKind::Index => "idx",
        }
    }

    /// Generate the file path for a segment with given ID
    pub fn path(self, dir: &Path, id: u32) -> PathBuf {
        dir.join(format!("{}{:06}.{}", self.prefix(), id, self.extension()))
    }

    /// Parse segment ID from filename
    /// "data_000042.dat" → Some(42)
    pub fn parse_id(self, path: &Path) -> Option<u32> {
        if path.extension()?.to_str()? != self.extension() {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix(self.prefix())?;
        id_str.parse().ok()
    }

    /// Discover the segment ids present in a directory, oldest first
    pub fn list(self, dir: &Path) -> Result<Vec<u32>> {
        let mut ids = Vec::new();
        if !dir.exists() {
            return Ok(ids);
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                if let Some(id) = self.parse_id(&path) {
                    ids.push(id);
                }
            }
        }

        ids.sort_unstable();
        Ok(ids)
    }
}

/// Decoded segment header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub id: u32,
    pub created: i64,
    pub tag: u8,
}

impl SegmentHeader {
    fn encode(&self, kind: SegmentKind) -> [u8; SEGMENT_HEADER_SIZE as usize] {
        let mut header = [0u8; SEGMENT_HEADER_SIZE as usize];
        header[0..4].copy_from_slice(kind.magic());
        header[4..6].copy_from_slice(&SEGMENT_VERSION.to_le_bytes());
        header[6..10].copy_from_slice(&self.id.to_le_bytes());
        header[10..18].copy_from_slice(&self.created.to_le_bytes());
        header[18] = self.tag;
        header
    }

    fn decode(kind: SegmentKind, bytes: &[u8; SEGMENT_HEADER_SIZE as usize]) -> Result<Self> {
        if &bytes[0..4] != kind.magic() {
            return Err(KvError::Corruption(format!(
                "invalid {:?} segment magic: {:?}",
                kind,
                &bytes[0..4]
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != SEGMENT_VERSION {
            return Err(KvError::Corruption(format!(
                "unsupported segment version: {}",
                version
            )));
        }

        let mut id = [0u8; 4];
        id.copy_from_slice(&bytes[6..10]);
        let mut created = [0u8; 8];
        created.copy_from_slice(&bytes[10..18]);

        Ok(Self {
            id: u32::from_le_bytes(id),
            created: i64::from_le_bytes(created),
            tag: bytes[18],
        })
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Appends records to the active segment of one log
pub struct SegmentWriter {
    kind: SegmentKind,
    dir: PathBuf,
    id: u32,
    tag: u8,
    file: File,
    /// Where the next append lands (== file length)
    offset: u64,
    sync_strategy: SyncStrategy,
    /// Appends since the last fsync
    unsynced: usize,
    /// A failed append could not be cut back; the file may end past `offset`
    torn: bool,
}

impl SegmentWriter {
    /// Open segment `id`, creating it (with a fresh header) if needed.
    ///
    /// `valid_end` is the end of the last valid record found by recovery;
    /// anything past it is cut off before new appends land. Pass `None`
    /// to keep the file as is.
    pub fn open(
        kind: SegmentKind,
        dir: &Path,
        id: u32,
        tag: u8,
        sync_strategy: SyncStrategy,
        valid_end: Option<u64>,
    ) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = kind.path(dir, id);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let mut len = file.metadata()?.len();

        if len < SEGMENT_HEADER_SIZE {
            // new file, or a crash while the header was being written
            file.set_len(0)?;
            let header = SegmentHeader {
                id,
                created: timestamp_now(),
                tag,
            };
            file.write_all(&header.encode(kind))?;
            file.sync_all()?;
            len = SEGMENT_HEADER_SIZE;
        } else if let Some(end) = valid_end {
            if end >= SEGMENT_HEADER_SIZE && end < len {
                tracing::warn!(
                    "Truncating {:?} segment {} from {} to {} bytes",
                    kind,
                    id,
                    len,
                    end
                );
                file.set_len(end)?;
                file.sync_all()?;
                len = end;
            }
        }

        Ok(Self {
            kind,
            dir: dir.to_path_buf(),
            id,
            tag,
            file,
            offset: len,
            sync_strategy,
            unsynced: 0,
            torn: false,
        })
    }

    /// Append one encoded record, returning the offset it was written at.
    ///
    /// On failure the segment is cut back to its previous length so the
    /// next append does not follow a partial record. If that cut fails too,
    /// every later append retries it first and fails until it succeeds.
    pub fn append(&mut self, record: &[u8]) -> io::Result<u64> {
        let offset = self.offset;

        if self.torn {
            self.file.set_len(offset)?;
            self.torn = false;
            tracing::info!("{:?} segment {} cut back to {} bytes", self.kind, self.id, offset);
        }

        if let Err(e) = self.file.write_all(record) {
            if let Err(cut) = self.file.set_len(offset) {
                tracing::warn!(
                    "{:?} segment {}: cannot cut partial record at {}: {}",
                    self.kind,
                    self.id,
                    offset,
                    cut
                );
                self.torn = true;
            }
            return Err(e);
        }

        self.offset += record.len() as u64;
        self.unsynced += 1;

        let must_sync = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if must_sync {
            self.sync()?;
        }

        Ok(offset)
    }

    /// Close the active segment and start segment `next_id`.
    ///
    /// The previous segment is synced and otherwise left untouched.
    pub fn rotate(&mut self, next_id: u32) -> Result<()> {
        self.sync()?;
        let next = Self::open(
            self.kind,
            &self.dir,
            next_id,
            self.tag,
            self.sync_strategy,
            None,
        )?;
        *self = next;
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> io::Result<()> {
        if self.unsynced > 0 {
            self.file.sync_data()?;
            self.unsynced = 0;
        }
        Ok(())
    }

    /// Active segment id
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Offset the next append will be written at
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Path of the active segment file
    pub fn path(&self) -> PathBuf {
        self.kind.path(&self.dir, self.id)
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Sequential reader over the records of one segment
pub struct SegmentReader {
    reader: BufReader<File>,
    header: SegmentHeader,
    /// Offset of the next unread byte
    position: u64,
}

impl SegmentReader {
    /// Open a segment and validate its header
    pub fn open(kind: SegmentKind, dir: &Path, id: u32) -> Result<Self> {
        let file = File::open(kind.path(dir, id))?;
        let mut reader = BufReader::new(file);

        let mut bytes = [0u8; SEGMENT_HEADER_SIZE as usize];
        reader.read_exact(&mut bytes).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                KvError::Corruption(format!("{:?} segment {} has no header", kind, id))
            }
            _ => KvError::Io(e),
        })?;

        let header = SegmentHeader::decode(kind, &bytes)?;
        if header.id != id {
            return Err(KvError::Corruption(format!(
                "{:?} segment {} claims id {}",
                kind, id, header.id
            )));
        }

        Ok(Self {
            reader,
            header,
            position: SEGMENT_HEADER_SIZE,
        })
    }

    /// Open a segment positioned at `offset` (for point reads)
    pub fn open_at(kind: SegmentKind, dir: &Path, id: u32, offset: u64) -> Result<Self> {
        let mut segment = Self::open(kind, dir, id)?;
        segment.reader.seek(SeekFrom::Start(offset))?;
        segment.position = offset;
        Ok(segment)
    }

    pub fn header(&self) -> &SegmentHeader {
        &self.header
    }

    /// Offset of the next record to read
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Record that `len` bytes were consumed by a decoder
    pub fn advance(&mut self, len: u64) {
        self.position += len;
    }

    /// Underlying buffered reader for record decoders
    pub fn reader(&mut self) -> &mut BufReader<File> {
        &mut self.reader
    }
}

/// Read the first byte of a record; `Ok(None)` on a clean end of segment
pub(crate) fn read_first_byte<R: Read>(reader: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// `read_exact` that reports a short read as a truncated record
pub(crate) fn read_record_part<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => KvError::Corruption(format!("truncated {}", what)),
        _ => KvError::Io(e),
    })
}

// =============================================================================
// Recovery
// =============================================================================

/// Result of scanning one segment during recovery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of valid records read
    pub records_recovered: u64,

    /// Offset right after the last valid record
    pub valid_end: u64,

    /// Whether bytes after the last valid record were found (partial or
    /// corrupted tail)
    pub was_truncated: bool,
}
