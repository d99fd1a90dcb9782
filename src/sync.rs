//! Namespace synchronization
//!
//! Copies every key of a namespace from one server to another over the
//! regular protocol:
//!
//! ```text
//! source                                  target
//!   │ NSINFO   (expected keys and bytes)
//!   │ SCAN ... (collect a batch of keys, up to batch_bytes)
//!   │ GET × n  (pipelined)  ──values──►     │ SET × n (pipelined)
//!   └──────────── repeat until SCAN says "No more data" ───┘
//! ```

use crate::client::Client;
use crate::error::{KvError, Result};
use crate::protocol::Frame;

/// Bytes of values fetched per pipelined batch (8 MB)
pub const DEFAULT_BATCH_BYTES: u64 = 8 * 1024 * 1024;

/// Where to copy from and to
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Source server `host:port`
    pub source: String,

    /// Target server `host:port`
    pub target: String,

    /// Namespace to copy (selected on both sides)
    pub namespace: String,

    /// Namespace password, if any
    pub password: Option<String>,

    /// Flush a batch once its values add up to this many bytes
    pub batch_bytes: u64,
}

impl SyncOptions {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            namespace: "default".to_string(),
            password: None,
            batch_bytes: DEFAULT_BATCH_BYTES,
        }
    }
}

/// Progress of a synchronization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Keys in the source namespace at warm-up
    pub keys: u64,

    /// Bytes in the source namespace at warm-up
    pub size: u64,

    /// Keys requested from the source
    pub requested: u64,

    /// Keys written to the target
    pub copied: u64,

    /// Value bytes written to the target
    pub transferred: u64,
}

/// Copies one namespace between two servers
pub struct Synchronizer {
    source: Client,
    target: Client,
    options: SyncOptions,
}

impl Synchronizer {
    /// Connect to both servers and select the namespace on each
    pub fn connect(options: SyncOptions) -> Result<Self> {
        let mut source = Client::connect(&options.source)?;
        let mut target = Client::connect(&options.target)?;

        for client in [&mut source, &mut target] {
            client.ping()?;
            client.select(&options.namespace, options.password.as_deref())?;
        }

        tracing::info!(
            "Syncing namespace {} from {} to {}",
            options.namespace,
            options.source,
            options.target
        );

        Ok(Self {
            source,
            target,
            options,
        })
    }

    /// Read the expected amount of work from the source
    pub fn warmup(&mut self) -> Result<SyncStatus> {
        let info = self.source.nsinfo(&self.options.namespace)?;
        let field = |name: &str| -> u64 {
            info.get(name)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
        };

        let status = SyncStatus {
            keys: field("entries"),
            size: field("data_size_bytes"),
            ..SyncStatus::default()
        };
        tracing::info!("Source holds {} keys, {} bytes", status.keys, status.size);

        Ok(status)
    }

    /// Copy every key
    pub fn run(&mut self) -> Result<SyncStatus> {
        let mut status = self.warmup()?;
        let mut cursor: Option<Vec<u8>> = None;

        loop {
            // Step 1: walk the keyspace until a batch is full
            let mut batch = Vec::new();
            let mut batch_bytes = 0u64;
            let mut finished = false;

            while batch_bytes < self.options.batch_bytes {
                match self.source.scan(cursor.as_deref())? {
                    Some(item) => {
                        batch_bytes += item.size;
                        cursor = Some(item.key.clone());
                        batch.push(item.key);
                    }
                    None => {
                        finished = true;
                        break;
                    }
                }
            }

            // Step 2: fetch and store the batch
            if !batch.is_empty() {
                self.copy_batch(&batch, &mut status)?;
                tracing::debug!(
                    "Synced {}/{} keys ({} bytes)",
                    status.copied,
                    status.keys,
                    status.transferred
                );
            }

            if finished {
                break;
            }
        }

        tracing::info!(
            "Sync complete: {} keys requested, {} copied, {} bytes",
            status.requested,
            status.copied,
            status.transferred
        );
        Ok(status)
    }

    fn copy_batch(&mut self, keys: &[Vec<u8>], status: &mut SyncStatus) -> Result<()> {
        for key in keys {
            self.source.send(&[b"GET".as_slice(), key.as_slice()])?;
        }
        status.requested += keys.len() as u64;

        let mut sent = 0usize;
        for key in keys {
            match self.source.receive()? {
                Frame::Bulk(value) => {
                    self.target.send(&[b"SET".as_slice(), key.as_slice(), value.as_slice()])?;
                    status.transferred += value.len() as u64;
                    sent += 1;
                }
                // deleted on the source since the scan
                Frame::Null => {}
                Frame::Error(message) => {
                    tracing::warn!("Source could not read key {:02x?}: {}", key, message)
                }
                other => {
                    return Err(KvError::Protocol(format!(
                        "unexpected GET reply: {:?}",
                        other
                    )))
                }
            }
        }

        for _ in 0..sent {
            match self.target.receive()? {
                Frame::Error(message) => tracing::warn!("Target rejected a key: {}", message),
                _ => status.copied += 1,
            }
        }

        Ok(())
    }
}
