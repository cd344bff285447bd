//! Ordered setlist state.
//!
//! The setlist only exposes two mutators, `remove` and `reorder`. Entries are
//! stored contiguously, so the position of an entry is always its index.

use std::collections::HashMap;

use log::{debug, warn};

use crate::song::Song;

/// Stable identity of one song occurrence inside a setlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

/// Public identity of a setlist row: song id plus position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub song_id: String,
    pub position: usize,
}

impl ItemKey {
    pub fn new(song_id: impl Into<String>, position: usize) -> Self {
        Self {
            song_id: song_id.into(),
            position,
        }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.song_id, self.position)
    }
}

/// One song occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct SetlistEntry {
    entry_id: EntryId,
    song: Song,
}

impl SetlistEntry {
    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    pub fn song(&self) -> &Song {
        &self.song
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoveError {
    #[error("remove index {index} out of range for setlist of length {len}")]
    OutOfRange { index: usize, len: usize },
}

/// Rejected reorder input. The setlist keeps its prior order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReorderError {
    #[error("reorder expected {expected} entries but received {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("reorder input is not a permutation of the current entries")]
    NotAPermutation,
    #[error("move from {from} to {to} is out of range for setlist of length {len}")]
    MoveOutOfRange { from: usize, to: usize, len: usize },
}

#[derive(Debug, Clone, Default)]
pub struct Setlist {
    entries: Vec<SetlistEntry>,
    next_entry_id: u64,
}

impl Setlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a setlist from `songs`, skipping any song without a file variant.
    pub fn from_songs(songs: impl IntoIterator<Item = Song>) -> Self {
        let mut setlist = Self::new();
        for song in songs {
            if !song.is_admissible() {
                warn!(
                    "Setlist: skipping song {} because it has no file variants",
                    song.id
                );
                continue;
            }
            let entry_id = EntryId(setlist.next_entry_id);
            setlist.next_entry_id += 1;
            setlist.entries.push(SetlistEntry { entry_id, song });
        }
        setlist
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SetlistEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&SetlistEntry> {
        self.entries.get(index)
    }

    pub fn song(&self, index: usize) -> Option<&Song> {
        self.entries.get(index).map(SetlistEntry::song)
    }

    /// Current order expressed as entry ids.
    pub fn entry_ids(&self) -> Vec<EntryId> {
        self.entries.iter().map(SetlistEntry::entry_id).collect()
    }

    pub fn key_at(&self, index: usize) -> Option<ItemKey> {
        self.entries
            .get(index)
            .map(|entry| ItemKey::new(entry.song.id.clone(), index))
    }

    pub fn position_of(&self, entry_id: EntryId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.entry_id == entry_id)
    }

    pub fn key_of(&self, entry_id: EntryId) -> Option<ItemKey> {
        self.position_of(entry_id)
            .and_then(|position| self.key_at(position))
    }

    /// Resolves a row key to its entry, provided the key still matches.
    pub fn entry_id_for_key(&self, key: &ItemKey) -> Option<EntryId> {
        self.entries
            .get(key.position)
            .filter(|entry| entry.song.id == key.song_id)
            .map(SetlistEntry::entry_id)
    }

    pub fn song_for_key(&self, key: &ItemKey) -> Option<&Song> {
        self.entries
            .get(key.position)
            .filter(|entry| entry.song.id == key.song_id)
            .map(SetlistEntry::song)
    }

    pub fn contains_song(&self, song_id: &str) -> bool {
        self.entries.iter().any(|entry| entry.song.id == song_id)
    }

    /// Number of occurrences of the song at `index` within `0..=index`.
    pub fn duplicate_count_at(&self, index: usize) -> usize {
        let Some(target) = self.entries.get(index) else {
            return 0;
        };
        self.entries[..=index]
            .iter()
            .filter(|entry| entry.song.id == target.song.id)
            .count()
    }

    /// Display suffix disambiguating repeated songs, e.g. `" (2)"`.
    pub fn duplicate_label_at(&self, index: usize) -> String {
        match self.duplicate_count_at(index) {
            count if count > 1 => format!(" ({count})"),
            _ => String::new(),
        }
    }

    /// Removes the entry at `index`, shifting later entries left.
    pub fn remove(&mut self, index: usize) -> Result<SetlistEntry, RemoveError> {
        if index >= self.entries.len() {
            return Err(RemoveError::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        let removed = self.entries.remove(index);
        debug!(
            "Setlist: removed {} at position {} ({} remaining)",
            removed.song.id,
            index,
            self.entries.len()
        );
        Ok(removed)
    }

    /// Replaces the order with `new_order`, which must be a permutation of the
    /// current entries. On rejection the current order is left untouched.
    pub fn reorder(&mut self, new_order: &[EntryId]) -> Result<(), ReorderError> {
        if new_order.len() != self.entries.len() {
            return Err(ReorderError::LengthMismatch {
                expected: self.entries.len(),
                actual: new_order.len(),
            });
        }

        let mut by_id: HashMap<EntryId, SetlistEntry> = self
            .entries
            .iter()
            .map(|entry| (entry.entry_id, entry.clone()))
            .collect();
        let mut reordered = Vec::with_capacity(new_order.len());
        for entry_id in new_order {
            match by_id.remove(entry_id) {
                Some(entry) => reordered.push(entry),
                None => return Err(ReorderError::NotAPermutation),
            }
        }

        self.entries = reordered;
        Ok(())
    }

    /// Moves the entry at `from` so that it ends up at index `to`.
    /// Returns `Ok(false)` when the move would not change the order.
    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<bool, ReorderError> {
        let len = self.entries.len();
        if from >= len || to >= len {
            return Err(ReorderError::MoveOutOfRange { from, to, len });
        }
        if from == to {
            return Ok(false);
        }
        let mut order = self.entry_ids();
        let moved = order.remove(from);
        order.insert(to, moved);
        self.reorder(&order)?;
        Ok(true)
    }
}
