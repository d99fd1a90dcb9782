//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Open every namespace on startup (replaying or rebuilding indexes)
//! - Hand out sessions to clients
//! - Execute commands against a session
//! - Sync everything to disk on close

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::namespace::{Namespace, NamespaceManager, SetOutcome, SetRequest};
use crate::protocol::{Command, Frame, NsSetting};
use crate::session::Session;

/// The main storage engine
///
/// ## Concurrency Model
///
/// The engine itself is immutable after `open`; it is shared between
/// connection threads behind an `Arc`. Each namespace serializes its own
/// writes and lets reads run concurrently (see [`crate::namespace`]), so
/// clients working in different namespaces never contend.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// All namespaces
    namespaces: NamespaceManager,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate the configuration
    /// 2. Discover namespaces under the index directory
    /// 3. Recover each namespace (index replay, data tail check)
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let namespaces =
            NamespaceManager::open(&config.data_dir, &config.index_dir, config.store_settings())?;

        tracing::info!(
            "Engine opened: mode {}, segment size {} bytes, {} namespaces",
            config.key_mode,
            config.segment_size,
            namespaces.len()
        );

        Ok(Self { config, namespaces })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with `{path}/data` and `{path}/index`
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().root_dir(path).build())
    }

    /// New session in the default namespace
    pub fn session(&self) -> Result<Session> {
        let admin = self.config.admin_password.is_none();
        Ok(Session::new(self.namespaces.default_namespace()?, admin))
    }

    /// Execute a command
    ///
    /// Routes commands to appropriate handlers. Rejections come back as
    /// `Err`; callers turn them into `-<message>` replies.
    pub fn execute(&self, session: &mut Session, command: Command) -> Result<Frame> {
        tracing::trace!("Executing {}", command.name());

        let namespace = Arc::clone(session.namespace());

        match command {
            Command::Ping => Ok(Frame::Simple("PONG".to_string())),

            Command::Set { key, value, timestamp } => {
                if key.len() > namespace.settings().max_key_length {
                    return Err(KvError::InvalidArgument("Key too large".to_string()));
                }
                if timestamp.is_some() {
                    session.require_admin()?;
                }
                session.require_writable()?;

                let outcome = namespace.set(SetRequest {
                    key: &key,
                    value: &value,
                    timestamp,
                })?;

                Ok(match outcome {
                    SetOutcome::Stored { key, .. } => Frame::Bulk(key),
                    SetOutcome::Unchanged { .. } => Frame::Null,
                })
            }

            Command::Get { key } => Ok(match namespace.get(&key)? {
                Some(stored) => Frame::Bulk(stored.value),
                None => Frame::Null,
            }),

            Command::Del { key } => {
                session.require_writable()?;
                namespace.delete(&key)?;
                Ok(Frame::ok())
            }

            Command::Exists { key } => Ok(Frame::Integer(namespace.exists(&key) as i64)),

            Command::Check { key } => Ok(match namespace.check(&key)? {
                Some(valid) => Frame::Integer(valid as i64),
                None => Frame::Null,
            }),

            Command::KeyTime { key } => Ok(match namespace.keytime(&key) {
                Some(timestamp) => Frame::Integer(timestamp),
                None => Frame::Null,
            }),

            Command::History { key } => {
                let versions = namespace
                    .history(&key)?
                    .into_iter()
                    .map(|v| {
                        Frame::Array(vec![
                            Frame::Integer(v.timestamp),
                            Frame::Integer(v.flags as i64),
                            Frame::Bulk(v.value),
                        ])
                    })
                    .collect();
                Ok(Frame::Array(versions))
            }

            Command::Scan { cursor } => {
                let entry = namespace
                    .scan(cursor.as_deref())?
                    .ok_or_else(|| KvError::NotFound("No more data".to_string()))?;

                Ok(Frame::Array(vec![
                    Frame::Bulk(entry.key),
                    Frame::Array(vec![
                        Frame::Integer(entry.length as i64),
                        Frame::Integer(entry.timestamp),
                    ]),
                ]))
            }

            Command::DbSize => Ok(Frame::Integer(namespace.entries() as i64)),

            Command::Info => Ok(Frame::Bulk(self.info().into_bytes())),

            Command::NsNew { name } => {
                session.require_admin()?;
                self.namespaces.create(&name)?;
                Ok(Frame::ok())
            }

            Command::NsList => Ok(Frame::Array(
                self.namespaces
                    .names()
                    .into_iter()
                    .map(|name| Frame::Bulk(name.into_bytes()))
                    .collect(),
            )),

            Command::NsInfo { name } => {
                let target = self.namespaces.get(&name)?;
                let selected = Arc::ptr_eq(&target, &namespace);
                if !session.is_admin() && !selected && !target.meta().public {
                    return Err(KvError::denied());
                }
                Ok(Frame::Bulk(namespace_info(&target)?.into_bytes()))
            }

            Command::NsSet { name, setting } => {
                session.require_admin()?;
                let target = self.namespaces.get(&name)?;
                target.update_meta(|meta| match setting {
                    NsSetting::MaxSize(size) => meta.maxsize = size,
                    NsSetting::Password(password) => meta.password = password,
                    NsSetting::Public(public) => meta.public = public,
                    NsSetting::Lock(locked) => meta.writable = !locked,
                })?;
                tracing::info!("Namespace {} settings changed", name);
                Ok(Frame::ok())
            }

            Command::Select { name, password } => {
                let target = self.namespaces.get(&name)?;
                session.select(target, password.as_deref())?;
                Ok(Frame::ok())
            }

            Command::Auth { password } => match &self.config.admin_password {
                Some(expected) if *expected == password => {
                    session.authenticate();
                    Ok(Frame::ok())
                }
                Some(_) => Err(KvError::denied()),
                None => Err(KvError::InvalidArgument(
                    "Authentication is not enabled".to_string(),
                )),
            },
        }
    }

    /// Server description for `INFO`
    pub fn info(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "# server");
        let _ = writeln!(text, "version: {}", crate::VERSION);
        let _ = writeln!(text, "mode: {}", self.config.key_mode);
        let _ = writeln!(text, "segment_size_bytes: {}", self.config.segment_size);
        let _ = writeln!(text, "max_key_length: {}", self.config.max_key_length);
        let _ = writeln!(text, "protected: {}", yes_no(self.config.admin_password.is_some()));
        let _ = writeln!(text, "namespaces: {}", self.namespaces.len());
        text
    }

    /// Close the engine gracefully
    ///
    /// Syncs every namespace to disk
    pub fn close(self) -> Result<()> {
        self.namespaces.sync_all()?;
        tracing::info!("Engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get a namespace by name
    pub fn namespace(&self, name: &str) -> Result<Arc<Namespace>> {
        self.namespaces.get(name)
    }

    pub fn namespaces(&self) -> &NamespaceManager {
        &self.namespaces
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Text reply of `NSINFO`
fn namespace_info(namespace: &Namespace) -> Result<String> {
    let info = namespace.info()?;

    let mut text = String::new();
    let _ = writeln!(text, "# namespace");
    let _ = writeln!(text, "name: {}", info.name);
    let _ = writeln!(text, "entries: {}", info.entries);
    let _ = writeln!(text, "public: {}", yes_no(info.meta.public));
    let _ = writeln!(text, "password: {}", yes_no(info.meta.password.is_some()));
    let _ = writeln!(text, "data_size_bytes: {}", info.datasize);
    let _ = writeln!(text, "data_size_mb: {:.2}", info.datasize as f64 / (1024.0 * 1024.0));
    let _ = writeln!(text, "data_limits_bytes: {}", info.meta.maxsize.unwrap_or(0));
    let _ = writeln!(text, "index_size_bytes: {}", info.index_disk_usage);
    let _ = writeln!(text, "data_disk_bytes: {}", info.data_disk_usage);
    let _ = writeln!(text, "mode: {}", info.mode);
    let _ = writeln!(text, "worm: {}", yes_no(!info.meta.writable));
    let _ = writeln!(text, "data_segment: {}", info.data_segment);
    Ok(text)
}
