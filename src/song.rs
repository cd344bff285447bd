//! Setlist song model.
//!
//! A song carries up to three display-title variants, one or more file
//! variants (e.g. different musical keys) and any number of reference links.

use crate::media_link;

/// Display-title preference applied when rendering a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    Primary,
    Alt1,
    Alt2,
}

/// One interchangeable file representation of a song.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct FileVariant {
    /// Variant identifier shown in the key selector (e.g. `"G"`).
    pub variant_key: String,
    /// Where the variant file lives.
    pub file_location: String,
}

/// A setlist item.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Song {
    /// Opaque song identifier. Not unique within a setlist.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub title_alt1: String,
    #[serde(default)]
    pub title_alt2: String,
    #[serde(default)]
    pub file_variants: Vec<FileVariant>,
    #[serde(default)]
    pub reference_links: Vec<String>,
}

impl Song {
    /// Returns true when the song may be admitted into a setlist.
    pub fn is_admissible(&self) -> bool {
        !self.file_variants.is_empty()
    }

    /// Picks the display title for `locale`, falling back through the other
    /// variants when the preferred one is blank.
    pub fn display_title(&self, locale: Locale) -> &str {
        let candidates: [&str; 3] = match locale {
            Locale::Primary => [
                self.title.as_str(),
                self.title_alt1.as_str(),
                self.title_alt2.as_str(),
            ],
            Locale::Alt1 => [
                self.title_alt1.as_str(),
                self.title.as_str(),
                self.title_alt2.as_str(),
            ],
            Locale::Alt2 => [
                self.title_alt2.as_str(),
                self.title.as_str(),
                self.title_alt1.as_str(),
            ],
        };
        candidates
            .into_iter()
            .find(|candidate| !candidate.trim().is_empty())
            .unwrap_or("")
    }

    pub fn first_variant(&self) -> Option<&FileVariant> {
        self.file_variants.first()
    }

    pub fn variant(&self, variant_key: &str) -> Option<&FileVariant> {
        self.file_variants
            .iter()
            .find(|variant| variant.variant_key == variant_key)
    }

    pub fn has_reference(&self, url: &str) -> bool {
        self.reference_links.iter().any(|link| link == url)
    }

    /// Reference links recognized as playable media, in link order.
    pub fn media_links(&self) -> Vec<String> {
        media_link::media_links(&self.reference_links)
    }
}

#[cfg(test)]
mod tests {
    use super::{FileVariant, Locale, Song};

    fn song_with_titles(title: &str, alt1: &str, alt2: &str) -> Song {
        Song {
            id: "song-1".to_string(),
            title: title.to_string(),
            title_alt1: alt1.to_string(),
            title_alt2: alt2.to_string(),
            file_variants: vec![FileVariant {
                variant_key: "C".to_string(),
                file_location: "/scores/song-1-c.pdf".to_string(),
            }],
            reference_links: vec![
                "https://example.com/lyrics".to_string(),
                "https://youtu.be/dQw4w9WgXcQ".to_string(),
            ],
        }
    }

    #[test]
    fn test_display_title_prefers_requested_locale() {
        let song = song_with_titles("Amazing Grace", "Sublime Gracia", "Grâce étonnante");
        assert_eq!(song.display_title(Locale::Primary), "Amazing Grace");
        assert_eq!(song.display_title(Locale::Alt1), "Sublime Gracia");
        assert_eq!(song.display_title(Locale::Alt2), "Grâce étonnante");
    }

    #[test]
    fn test_display_title_falls_back_when_preferred_is_blank() {
        let song = song_with_titles("", "  ", "Grâce étonnante");
        assert_eq!(song.display_title(Locale::Alt1), "Grâce étonnante");

        let song = song_with_titles("Amazing Grace", "", "Grâce étonnante");
        assert_eq!(song.display_title(Locale::Alt1), "Amazing Grace");
    }

    #[test]
    fn test_media_links_only_returns_recognized_links() {
        let song = song_with_titles("Amazing Grace", "", "");
        assert_eq!(song.media_links(), vec!["https://youtu.be/dQw4w9WgXcQ"]);
    }

    #[test]
    fn test_song_without_variants_is_not_admissible() {
        let mut song = song_with_titles("Amazing Grace", "", "");
        assert!(song.is_admissible());
        song.file_variants.clear();
        assert!(!song.is_admissible());
    }
}
