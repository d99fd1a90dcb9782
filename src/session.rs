//! Client sessions
//!
//! Per-connection state: the selected namespace and what the client may do.

use std::sync::Arc;

use crate::error::{KvError, Result};
use crate::namespace::{Namespace, NamespaceMeta};

/// State of one client connection
pub struct Session {
    namespace: Arc<Namespace>,

    /// Authenticated as administrator
    admin: bool,

    /// May write to the selected namespace
    writable: bool,
}

impl Session {
    /// New session in `namespace`; `admin` when no admin password is set
    pub fn new(namespace: Arc<Namespace>, admin: bool) -> Self {
        let writable = admin || Self::open_access(&namespace.meta());
        Self {
            namespace,
            admin,
            writable,
        }
    }

    /// Namespaces without a password grant full access
    fn open_access(meta: &NamespaceMeta) -> bool {
        meta.password.is_none()
    }

    /// Switch to `namespace`.
    ///
    /// - admin, or no namespace password, or the right password: read-write
    /// - public namespace without a password given: read-only
    /// - anything else: `Permission denied`
    pub fn select(&mut self, namespace: Arc<Namespace>, password: Option<&str>) -> Result<()> {
        let meta = namespace.meta();

        let writable = if self.admin || Self::open_access(&meta) {
            true
        } else {
            match password {
                Some(given) if meta.password.as_deref() == Some(given) => true,
                None if meta.public => false,
                _ => return Err(KvError::denied()),
            }
        };

        tracing::debug!(
            "Session switched to namespace {} ({})",
            namespace.name(),
            if writable { "read-write" } else { "read-only" }
        );

        self.namespace = namespace;
        self.writable = writable;
        Ok(())
    }

    /// Grant admin rights (after a successful `AUTH`)
    pub fn authenticate(&mut self) {
        self.admin = true;
        self.writable = true;
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Fail unless the session may write
    pub fn require_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(KvError::read_only())
        }
    }

    /// Fail unless the session is admin
    pub fn require_admin(&self) -> Result<()> {
        if self.admin {
            Ok(())
        } else {
            Err(KvError::denied())
        }
    }
}
