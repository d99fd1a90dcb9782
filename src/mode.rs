//! Key Modes
//!
//! How the key of a write is chosen is fixed per store:
//!
//! ```text
//! ┌────────────┬───────────────────────────────┬──────────────────────────┐
//! │ Mode       │ Key source                    │ Updates                  │
//! ├────────────┼───────────────────────────────┼──────────────────────────┤
//! │ UserKey    │ client key, 1..=255 bytes     │ existing key ⇒ update    │
//! │ Sequential │ empty ⇒ next id (u32 LE)      │ existing 4-byte keys only│
//! │ DirectKey  │ {segment, object} (2 × u32 LE)│ never                    │
//! │ FixedBlock │ same as Sequential            │ same as Sequential       │
//! └────────────┴───────────────────────────────┴──────────────────────────┘
//! ```
//!
//! Key selection is split in two: [`resolve`] runs before any I/O and may
//! reject the request, [`allocate`] runs after the rotation check so that
//! direct keys name the segment the value really lands in.

use std::fmt;
use std::str::FromStr;

use crate::error::{KvError, Result};
use crate::index::{IndexEntry, IndexStore};

/// Size of a sequential key
pub const SEQUENTIAL_KEY_SIZE: usize = 4;

/// Size of a direct key
pub const DIRECT_KEY_SIZE: usize = 8;

/// Store-wide key mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    /// Client supplies the key
    #[default]
    UserKey,

    /// Keys are generated ids
    Sequential,

    /// Keys encode where the value is stored
    DirectKey,

    /// Fixed-size block store (behaves as Sequential)
    FixedBlock,
}

impl KeyMode {
    /// Tag stored in index segment headers
    pub fn tag(self) -> u8 {
        match self {
            KeyMode::UserKey => 0,
            KeyMode::Sequential => 1,
            KeyMode::DirectKey => 2,
            KeyMode::FixedBlock => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(KeyMode::UserKey),
            1 => Some(KeyMode::Sequential),
            2 => Some(KeyMode::DirectKey),
            3 => Some(KeyMode::FixedBlock),
            _ => None,
        }
    }

    /// Whether a write may replace an existing key
    pub fn allows_updates(self) -> bool {
        !matches!(self, KeyMode::DirectKey)
    }
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyMode::UserKey => "userkey",
            KeyMode::Sequential => "sequential",
            KeyMode::DirectKey => "directkey",
            KeyMode::FixedBlock => "fixedblock",
        };
        f.write_str(name)
    }
}

impl FromStr for KeyMode {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "user" | "userkey" => Ok(KeyMode::UserKey),
            "seq" | "sequential" => Ok(KeyMode::Sequential),
            "direct" | "directkey" => Ok(KeyMode::DirectKey),
            "block" | "fixedblock" => Ok(KeyMode::FixedBlock),
            other => Err(KvError::Config(format!("unknown key mode: {}", other))),
        }
    }
}

// =============================================================================
// Key encodings
// =============================================================================

pub fn sequential_key(id: u32) -> Vec<u8> {
    id.to_le_bytes().to_vec()
}

/// Id of a 4-byte sequential key
pub fn parse_sequential_key(key: &[u8]) -> Option<u32> {
    let bytes: [u8; SEQUENTIAL_KEY_SIZE] = key.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Key of a direct-mode object: the segment holding it and its number
/// within that segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectKey {
    pub segment: u32,
    pub object: u32,
}

impl DirectKey {
    pub fn encode(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(DIRECT_KEY_SIZE);
        key.extend_from_slice(&self.segment.to_le_bytes());
        key.extend_from_slice(&self.object.to_le_bytes());
        key
    }

    pub fn decode(key: &[u8]) -> Option<Self> {
        if key.len() != DIRECT_KEY_SIZE {
            return None;
        }
        let segment = u32::from_le_bytes([key[0], key[1], key[2], key[3]]);
        let object = u32::from_le_bytes([key[4], key[5], key[6], key[7]]);
        Some(Self { segment, object })
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Where the key of a write comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySlot {
    /// Key known up front (client key, or an existing sequential key)
    Given(Vec<u8>),

    /// Fresh sequential id
    NextSequential,

    /// Fresh `{segment, object}` pair
    NextDirect,
}

/// Outcome of [`resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub slot: KeySlot,

    /// Current entry when the write is an update
    pub existing: Option<IndexEntry>,
}

/// Decide the key of a write and fetch the entry it would update.
///
/// Performs no I/O and changes nothing; rejections are returned as is.
pub fn resolve(mode: KeyMode, client_key: &[u8], index: &IndexStore) -> Result<Resolution> {
    match mode {
        KeyMode::UserKey => {
            if client_key.is_empty() {
                return Err(KvError::InvalidArgument(
                    "Invalid argument, key needed".to_string(),
                ));
            }
            Ok(Resolution {
                slot: KeySlot::Given(client_key.to_vec()),
                existing: index.lookup(client_key).cloned(),
            })
        }

        KeyMode::Sequential | KeyMode::FixedBlock => match client_key.len() {
            0 => Ok(Resolution {
                slot: KeySlot::NextSequential,
                existing: None,
            }),
            SEQUENTIAL_KEY_SIZE => match index.lookup(client_key) {
                Some(entry) => Ok(Resolution {
                    slot: KeySlot::Given(client_key.to_vec()),
                    existing: Some(entry.clone()),
                }),
                None => Err(KvError::NotFound(
                    "Invalid key, only update authorized".to_string(),
                )),
            },
            _ => Err(KvError::InvalidArgument(
                "Invalid key, use empty key for auto-generated key".to_string(),
            )),
        },

        KeyMode::DirectKey => {
            if !client_key.is_empty() {
                return Err(KvError::InvalidArgument(
                    "Invalid key, use empty key for auto-generated key".to_string(),
                ));
            }
            Ok(Resolution {
                slot: KeySlot::NextDirect,
                existing: None,
            })
        }
    }
}

/// Turn a slot into a concrete key, drawing ids from the index.
///
/// Must run after any rotation for the write has happened.
pub fn allocate(slot: KeySlot, index: &mut IndexStore) -> Result<Vec<u8>> {
    match slot {
        KeySlot::Given(key) => Ok(key),
        KeySlot::NextSequential => Ok(sequential_key(index.next_id()?)),
        KeySlot::NextDirect => {
            let segment = index.current_segment_id();
            let object = index.next_objectid()?;
            Ok(DirectKey { segment, object }.encode())
        }
    }
}
