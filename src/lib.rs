//! # zerokv
//!
//! An append-only key-value store with:
//! - Numbered data segments holding immutable value records
//! - A paired, replayable index with a per-key version chain
//! - Four key modes (user keys, sequential ids, direct keys, fixed blocks)
//! - Namespaces with quotas, passwords and a read-only lock
//! - A Redis-compatible (RESP) TCP protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                             │
//! │              (thread per connection, RESP)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Session + Command
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                │
//! │                 (NamespaceManager)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Namespace                               │
//! │   set: validate → key mode → quota → rotate → append → index│
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │    Data Log     │  segment N ◄─► │   Index Store   │
//!   │ data_N.dat      │                │ index_N.idx     │
//!   └─────────────────┘                └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod segment;
pub mod data;
pub mod index;
pub mod mode;
pub mod namespace;
pub mod session;
pub mod protocol;
pub mod engine;
pub mod network;
pub mod client;
pub mod sync;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use client::Client;
pub use config::{Config, StoreSettings, SyncStrategy};
pub use engine::Engine;
pub use error::{KvError, Result};
pub use mode::KeyMode;
pub use namespace::{Namespace, SetOutcome, SetRequest};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of zerokv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
