//! Configuration for zerokv
//!
//! Centralized configuration with sensible defaults. The configuration is
//! read-only once the engine is open; namespaces receive the storage subset
//! as a [`StoreSettings`] value.

use std::path::PathBuf;

use crate::error::{KvError, Result};
use crate::mode::KeyMode;

/// Largest key the on-disk format can frame (1-byte length prefix)
pub const MAX_KEY_LENGTH: usize = 255;

/// Default segment size: 256 MB
pub const DEFAULT_SEGMENT_SIZE: u64 = 256 * 1024 * 1024;

/// Main configuration for a zerokv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for data segments
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {namespace}/
    ///           ├── data_000000.dat
    ///           └── data_000001.dat
    pub data_dir: PathBuf,

    /// Root directory for index segments and namespace metadata
    /// Internal structure:
    ///   {index_dir}/
    ///     └── {namespace}/
    ///           ├── namespace.meta
    ///           └── index_000000.idx
    pub index_dir: PathBuf,

    /// Key assignment strategy, fixed for the lifetime of the store
    pub key_mode: KeyMode,

    /// Size threshold after which data and index segments rotate (bytes)
    pub segment_size: u64,

    /// Longest key accepted by SET (at most 255)
    pub max_key_length: usize,

    /// Sync strategy: how often to fsync segment files
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Access Configuration
    // -------------------------------------------------------------------------
    /// Password granting admin rights; when unset every client is admin
    pub admin_password: Option<String>,
}

/// Segment sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced appends (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Storage settings shared by every namespace of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub key_mode: KeyMode,
    pub segment_size: u64,
    pub max_key_length: usize,
    pub sync_strategy: SyncStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./zerokv_data/data"),
            index_dir: PathBuf::from("./zerokv_data/index"),
            key_mode: KeyMode::UserKey,
            segment_size: DEFAULT_SEGMENT_SIZE,
            max_key_length: MAX_KEY_LENGTH,
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            listen_addr: "127.0.0.1:9900".to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
            admin_password: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the values the storage layer depends on
    pub fn validate(&self) -> Result<()> {
        if self.segment_size == 0 {
            return Err(KvError::Config("segment size must be positive".to_string()));
        }
        if self.max_key_length == 0 || self.max_key_length > MAX_KEY_LENGTH {
            return Err(KvError::Config(format!(
                "max key length must be within 1..={}, got {}",
                MAX_KEY_LENGTH, self.max_key_length
            )));
        }
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(KvError::Config("sync interval must be positive".to_string()));
        }
        if matches!(self.admin_password.as_deref(), Some("")) {
            return Err(KvError::Config("admin password cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Storage subset handed to namespaces
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            key_mode: self.key_mode,
            segment_size: self.segment_size,
            max_key_length: self.max_key_length,
            sync_strategy: self.sync_strategy,
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Use `{root}/data` and `{root}/index` as storage directories
    pub fn root_dir(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.config.data_dir = root.join("data");
        self.config.index_dir = root.join("index");
        self
    }

    /// Set the data segment directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the index segment directory
    pub fn index_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_dir = path.into();
        self
    }

    /// Set the key mode
    pub fn key_mode(mut self, mode: KeyMode) -> Self {
        self.config.key_mode = mode;
        self
    }

    /// Set the segment rotation threshold (in bytes)
    pub fn segment_size(mut self, size: u64) -> Self {
        self.config.segment_size = size;
        self
    }

    /// Set the maximum key length
    pub fn max_key_length(mut self, length: usize) -> Self {
        self.config.max_key_length = length;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Require a password for admin commands
    pub fn admin_password(mut self, password: impl Into<String>) -> Self {
        self.config.admin_password = Some(password.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
