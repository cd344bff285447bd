//! Per-song variant and reference selection.
//!
//! Selection is keyed by song id, so repeated occurrences of one song share a
//! single selection.

use std::collections::HashMap;

use log::debug;

use crate::song::Song;

/// Active file variant and playback reference for one song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongSelection {
    pub selected_variant_key: String,
    /// Empty when the song has no recognized media link.
    pub selected_reference_url: String,
}

impl SongSelection {
    fn defaults_for(song: &Song) -> Self {
        Self {
            selected_variant_key: song
                .first_variant()
                .map(|variant| variant.variant_key.clone())
                .unwrap_or_default(),
            selected_reference_url: song.media_links().into_iter().next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("song {song_id} has no variant {variant_key}")]
    UnknownVariant {
        song_id: String,
        variant_key: String,
    },
    #[error("song {song_id} has no reference link {url}")]
    UnknownReference { song_id: String, url: String },
}

#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    by_song: HashMap<String, SongSelection>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the selection for `song`, creating the default on first access.
    pub fn ensure(&mut self, song: &Song) -> &SongSelection {
        self.by_song
            .entry(song.id.clone())
            .or_insert_with(|| SongSelection::defaults_for(song))
    }

    pub fn get(&self, song_id: &str) -> Option<&SongSelection> {
        self.by_song.get(song_id)
    }

    /// Selection for `song` without materializing defaults.
    pub fn current(&self, song: &Song) -> SongSelection {
        self.by_song
            .get(&song.id)
            .cloned()
            .unwrap_or_else(|| SongSelection::defaults_for(song))
    }

    pub fn select_variant(&mut self, song: &Song, variant_key: &str) -> Result<(), SelectionError> {
        if song.variant(variant_key).is_none() {
            return Err(SelectionError::UnknownVariant {
                song_id: song.id.clone(),
                variant_key: variant_key.to_string(),
            });
        }
        let selection = self
            .by_song
            .entry(song.id.clone())
            .or_insert_with(|| SongSelection::defaults_for(song));
        selection.selected_variant_key = variant_key.to_string();
        debug!("Selection: song {} now uses variant {}", song.id, variant_key);
        Ok(())
    }

    /// Selects the playback reference for `song`. An empty `url` clears it.
    pub fn select_reference(&mut self, song: &Song, url: &str) -> Result<(), SelectionError> {
        if !url.is_empty() && !song.has_reference(url) {
            return Err(SelectionError::UnknownReference {
                song_id: song.id.clone(),
                url: url.to_string(),
            });
        }
        let selection = self
            .by_song
            .entry(song.id.clone())
            .or_insert_with(|| SongSelection::defaults_for(song));
        selection.selected_reference_url = url.to_string();
        debug!("Selection: song {} now references '{}'", song.id, url);
        Ok(())
    }

    /// File location of the selected variant, falling back to the first one.
    pub fn selected_file_location<'a>(&self, song: &'a Song) -> Option<&'a str> {
        let selected = self
            .by_song
            .get(&song.id)
            .and_then(|selection| song.variant(&selection.selected_variant_key));
        selected
            .or_else(|| song.first_variant())
            .map(|variant| variant.file_location.as_str())
    }

    pub fn discard(&mut self, song_id: &str) -> bool {
        self.by_song.remove(song_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_song.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_song.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{SelectionError, SelectionStore};
    use crate::song::{FileVariant, Song};

    fn song() -> Song {
        Song {
            id: "grace".to_string(),
            title: "Amazing Grace".to_string(),
            title_alt1: String::new(),
            title_alt2: String::new(),
            file_variants: vec![
                FileVariant {
                    variant_key: "G".to_string(),
                    file_location: "/scores/grace-g.pdf".to_string(),
                },
                FileVariant {
                    variant_key: "A".to_string(),
                    file_location: "/scores/grace-a.pdf".to_string(),
                },
            ],
            reference_links: vec![
                "https://example.com/grace-chords".to_string(),
                "https://youtu.be/aaaaaaaaaaa".to_string(),
                "https://youtu.be/bbbbbbbbbbb".to_string(),
            ],
        }
    }

    #[test]
    fn test_defaults_pick_first_variant_and_first_media_link() {
        let mut store = SelectionStore::new();
        let selection = store.ensure(&song()).clone();
        assert_eq!(selection.selected_variant_key, "G");
        assert_eq!(selection.selected_reference_url, "https://youtu.be/aaaaaaaaaaa");
    }

    #[test]
    fn test_defaults_leave_reference_empty_without_media_links() {
        let mut song = song();
        song.reference_links.truncate(1);
        let store = SelectionStore::new();
        assert_eq!(store.current(&song).selected_reference_url, "");
    }

    #[test]
    fn test_select_variant_rejects_unknown_key() {
        let mut store = SelectionStore::new();
        let song = song();
        assert_eq!(
            store.select_variant(&song, "Bb"),
            Err(SelectionError::UnknownVariant {
                song_id: "grace".to_string(),
                variant_key: "Bb".to_string(),
            })
        );
        store.select_variant(&song, "A").expect("A is a known variant");
        assert_eq!(store.selected_file_location(&song), Some("/scores/grace-a.pdf"));
    }

    #[test]
    fn test_select_reference_requires_membership() {
        let mut store = SelectionStore::new();
        let song = song();
        assert!(store
            .select_reference(&song, "https://youtu.be/ccccccccccc")
            .is_err());
        store
            .select_reference(&song, "https://youtu.be/bbbbbbbbbbb")
            .expect("link belongs to the song");
        assert_eq!(
            store.get("grace").map(|s| s.selected_reference_url.as_str()),
            Some("https://youtu.be/bbbbbbbbbbb")
        );
        store.select_reference(&song, "").expect("empty clears");
        assert_eq!(store.current(&song).selected_reference_url, "");
    }

    #[test]
    fn test_selected_file_location_defaults_to_first_variant() {
        let store = SelectionStore::new();
        assert_eq!(store.selected_file_location(&song()), Some("/scores/grace-g.pdf"));
    }
}
