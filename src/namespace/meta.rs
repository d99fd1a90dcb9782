//! Namespace metadata
//!
//! Settings an administrator can change at runtime. Stored with bincode in
//! `{index_dir}/{namespace}/namespace.meta`; counters such as `datasize` are
//! not stored, they are rebuilt by index replay.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadata file name inside a namespace's index directory
pub const META_FILENAME: &str = "namespace.meta";

/// Persisted namespace settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceMeta {
    /// Quota on the sum of live value lengths (None = unlimited)
    pub maxsize: Option<u64>,

    /// Password required for read-write access
    pub password: Option<String>,

    /// Public namespaces can be read without the password
    pub public: bool,

    /// Cleared by `NSSET ns lock 1`
    pub writable: bool,
}

impl Default for NamespaceMeta {
    fn default() -> Self {
        Self {
            maxsize: None,
            password: None,
            public: true,
            writable: true,
        }
    }
}

impl NamespaceMeta {
    fn path(dir: &Path) -> PathBuf {
        dir.join(META_FILENAME)
    }

    /// Load the metadata of the namespace stored in `dir`, if any
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(dir);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        Ok(Some(bincode::deserialize(&bytes)?))
    }

    /// Persist atomically: write a temp file, then rename over the old one
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = Self::path(dir);
        let tmp = path.with_extension("meta.tmp");

        let bytes = bincode::serialize(self)?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        Ok(())
    }
}
