//! Error types for zerokv
//!
//! Provides a unified error type for all operations. The `Display` text of
//! each variant is what a client sees in a `-<message>` reply, so the wording
//! of the request-level variants is kept stable.

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for zerokv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Request Errors (rejected before any I/O)
    // -------------------------------------------------------------------------
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("No space left on this namespace")]
    QuotaExceeded,

    #[error("{0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Internal Error (data)")]
    StorageData(#[source] std::io::Error),

    #[error("Internal Error (index)")]
    StorageIndex(#[source] std::io::Error),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// Shorthand for a missing key
    pub fn key_not_found() -> Self {
        KvError::NotFound("Key not found".to_string())
    }

    /// Shorthand for a write against a read-only namespace or session
    pub fn read_only() -> Self {
        KvError::PermissionDenied("Namespace is in read-only mode".to_string())
    }

    /// Shorthand for an admin-only command issued without admin rights
    pub fn denied() -> Self {
        KvError::PermissionDenied("Permission denied".to_string())
    }

    /// True for errors that leave all state untouched (rejected before I/O)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            KvError::InvalidArgument(_)
                | KvError::PermissionDenied(_)
                | KvError::QuotaExceeded
                | KvError::NotFound(_)
        )
    }
}

impl From<bincode::Error> for KvError {
    fn from(e: bincode::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}
