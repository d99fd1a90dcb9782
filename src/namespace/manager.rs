//! Namespace Manager
//!
//! Discovers namespaces on startup and hands them out to sessions.
//!
//! ## Responsibilities
//! - Open every namespace directory found under the index root
//! - Always provide the `default` namespace
//! - Create namespaces on demand (`NSNEW`)

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::StoreSettings;
use crate::error::{KvError, Result};

use super::Namespace;

/// Namespace every session starts in
pub const DEFAULT_NAMESPACE: &str = "default";

/// Longest namespace name
const MAX_NAME_LENGTH: usize = 128;

/// Check a namespace name: 1..=128 of `[A-Za-z0-9_.-]`, no leading dot
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'));

    if valid {
        Ok(())
    } else {
        Err(KvError::InvalidArgument("Invalid namespace name".to_string()))
    }
}

/// Owns every namespace of an engine
///
/// ## Concurrency:
/// - `namespaces`: RwLock over the map only; each namespace locks itself
/// - Sessions hold `Arc<Namespace>`, so lookups are short
pub struct NamespaceManager {
    data_root: PathBuf,
    index_root: PathBuf,
    settings: StoreSettings,
    namespaces: RwLock<HashMap<String, Arc<Namespace>>>,
}

impl NamespaceManager {
    /// Open every namespace under `index_root`, creating `default` if needed
    pub fn open(data_root: &Path, index_root: &Path, settings: StoreSettings) -> Result<Self> {
        fs::create_dir_all(data_root)?;
        fs::create_dir_all(index_root)?;

        let mut names = Vec::new();
        for root in [index_root, data_root] {
            for entry in fs::read_dir(root)? {
                let path = entry?.path();
                if !path.is_dir() {
                    continue;
                }
                let name = match path.file_name().and_then(|n| n.to_str()) {
                    Some(name) => name.to_string(),
                    None => continue,
                };
                if validate_name(&name).is_ok() && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        if !names.iter().any(|n| n == DEFAULT_NAMESPACE) {
            names.push(DEFAULT_NAMESPACE.to_string());
        }
        names.sort();

        let mut namespaces = HashMap::new();
        for name in names {
            let namespace = Namespace::open(&name, data_root, index_root, settings)?;
            namespaces.insert(name, Arc::new(namespace));
        }

        tracing::info!("Loaded {} namespaces", namespaces.len());

        Ok(Self {
            data_root: data_root.to_path_buf(),
            index_root: index_root.to_path_buf(),
            settings,
            namespaces: RwLock::new(namespaces),
        })
    }

    /// Get a namespace by name
    pub fn get(&self, name: &str) -> Result<Arc<Namespace>> {
        self.namespaces
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| KvError::NotFound("Namespace not found".to_string()))
    }

    /// The `default` namespace
    pub fn default_namespace(&self) -> Result<Arc<Namespace>> {
        self.get(DEFAULT_NAMESPACE)
    }

    /// Create a new, empty namespace
    pub fn create(&self, name: &str) -> Result<Arc<Namespace>> {
        validate_name(name)?;

        let mut namespaces = self.namespaces.write();
        if namespaces.contains_key(name) {
            return Err(KvError::InvalidArgument(
                "This namespace is not available".to_string(),
            ));
        }

        let namespace = Arc::new(Namespace::open(
            name,
            &self.data_root,
            &self.index_root,
            self.settings,
        )?);
        namespaces.insert(name.to_string(), Arc::clone(&namespace));

        tracing::info!("Namespace {} created", name);
        Ok(namespace)
    }

    /// Names of all namespaces, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of namespaces
    pub fn len(&self) -> usize {
        self.namespaces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.read().is_empty()
    }

    /// Sync every namespace to disk
    pub fn sync_all(&self) -> Result<()> {
        let namespaces: Vec<Arc<Namespace>> = self.namespaces.read().values().cloned().collect();
        for namespace in namespaces {
            namespace.sync()?;
        }
        Ok(())
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }
}
