//! In-memory index table
//!
//! Entries live in an insertion-ordered arena; a hash map points each key at
//! its slot. Updates mutate the slot in place, deletes empty it. Keeping the
//! arena order stable is what lets `SCAN` resume from a key cursor.
//!
//! Emptied slots are squeezed out once they outnumber the live ones, so a
//! long delete history does not slow down `first`/`after`.

use std::collections::HashMap;

use super::IndexEntry;

/// Fewest dead slots worth a compaction
const COMPACT_MIN_DEAD: usize = 64;

/// Live keys of one namespace
#[derive(Debug, Default)]
pub struct IndexTable {
    /// Entries in first-insertion order (None = deleted)
    slots: Vec<Option<IndexEntry>>,

    /// key → slot
    keys: HashMap<Vec<u8>, usize>,

    /// Number of `None` slots
    dead: usize,

    /// Sum of value lengths of live entries
    datasize: u64,
}

impl IndexTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry of a key
    pub fn get(&self, key: &[u8]) -> Option<&IndexEntry> {
        self.keys.get(key).and_then(|&slot| self.slots[slot].as_ref())
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.keys.contains_key(key)
    }

    /// Insert a new entry, or replace the entry of the same key in place.
    /// Returns the replaced entry.
    pub fn upsert(&mut self, entry: IndexEntry) -> Option<IndexEntry> {
        self.datasize += entry.length as u64;

        match self.keys.get(&entry.key) {
            Some(&slot) => {
                let old = self.slots[slot].replace(entry);
                if let Some(old) = &old {
                    self.datasize -= old.length as u64;
                }
                old
            }
            None => {
                self.keys.insert(entry.key.clone(), self.slots.len());
                self.slots.push(Some(entry));
                None
            }
        }
    }

    /// Remove a key, returning its entry
    pub fn remove(&mut self, key: &[u8]) -> Option<IndexEntry> {
        let slot = self.keys.remove(key)?;
        let old = self.slots[slot].take();
        if let Some(old) = &old {
            self.datasize -= old.length as u64;
            self.dead += 1;
        }

        if self.dead >= COMPACT_MIN_DEAD && self.dead > self.keys.len() {
            self.compact();
        }
        old
    }

    /// Drop empty slots, keeping the order of the live ones
    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        for (slot, entry) in self.slots.iter().flatten().enumerate() {
            if let Some(index) = self.keys.get_mut(&entry.key) {
                *index = slot;
            }
        }
        self.dead = 0;
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sum of value lengths of live entries
    pub fn datasize(&self) -> u64 {
        self.datasize
    }

    /// Slots held in memory, deleted ones included
    pub fn arena_len(&self) -> usize {
        self.slots.len()
    }

    /// First live entry in insertion order
    pub fn first(&self) -> Option<&IndexEntry> {
        self.slots.iter().flatten().next()
    }

    /// Live entry following `key` in insertion order.
    ///
    /// `None` when `key` is the last entry or is not a live key.
    pub fn after(&self, key: &[u8]) -> Option<&IndexEntry> {
        let &slot = self.keys.get(key)?;
        self.slots[slot + 1..].iter().flatten().next()
    }

    /// Iterate live entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.slots.iter().flatten()
    }
}
