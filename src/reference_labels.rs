//! Human-readable labels for a song's alternate media references.
//!
//! Titles come from an external lookup service. Lookup failures never fail
//! the call: unresolved links get a positional label instead.

use std::collections::HashMap;

use log::{debug, warn};

use crate::media_link;

/// One title returned by the lookup service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTitle {
    pub url: String,
    pub title: String,
    pub media_id: String,
}

/// Batch title lookup for media links.
///
/// URLs missing from a successful response are treated as individual failures.
pub trait TitleLookup: Send + Sync {
    fn lookup_titles(&self, urls: &[String]) -> Result<Vec<LookupTitle>, String>;
}

/// Selector entry for one media link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLabel {
    pub url: String,
    pub label: String,
    pub media_id: Option<String>,
    /// False when the label is the positional fallback.
    pub resolved: bool,
}

fn positional_label(index: usize) -> String {
    format!("Reference {}", index + 1)
}

/// Combines `urls` with a lookup result into one label per URL.
pub fn build_labels(
    urls: &[String],
    lookup_result: &Result<Vec<LookupTitle>, String>,
) -> Vec<ReferenceLabel> {
    let titles: HashMap<&str, &LookupTitle> = match lookup_result {
        Ok(titles) => titles
            .iter()
            .map(|title| (title.url.as_str(), title))
            .collect(),
        Err(err) => {
            debug!("ReferenceLabels: lookup failed for whole batch: {}", err);
            HashMap::new()
        }
    };

    urls.iter()
        .enumerate()
        .map(|(index, url)| {
            let media_id = media_link::extract_media_id(url);
            match titles
                .get(url.as_str())
                .filter(|found| !found.title.trim().is_empty())
            {
                Some(found) => ReferenceLabel {
                    url: url.clone(),
                    label: found.title.trim().to_string(),
                    media_id: media_id.or_else(|| Some(found.media_id.clone())),
                    resolved: true,
                },
                None => ReferenceLabel {
                    url: url.clone(),
                    label: positional_label(index),
                    media_id,
                    resolved: false,
                },
            }
        })
        .collect()
}

/// Session-scoped label cache keyed by the exact URL set.
#[derive(Debug, Default)]
pub struct ReferenceLabelResolver {
    cache: HashMap<Vec<String>, Vec<ReferenceLabel>>,
}

impl ReferenceLabelResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self, media_urls: &[String]) -> Option<&[ReferenceLabel]> {
        self.cache.get(media_urls).map(Vec::as_slice)
    }

    /// Builds labels from a finished lookup and caches them when every URL
    /// resolved. Partially resolved sets are retried on the next request.
    pub fn complete(
        &mut self,
        song_id: &str,
        media_urls: &[String],
        lookup_result: &Result<Vec<LookupTitle>, String>,
    ) -> Vec<ReferenceLabel> {
        let labels = build_labels(media_urls, lookup_result);
        let unresolved = labels.iter().filter(|label| !label.resolved).count();
        if unresolved == 0 {
            self.cache.insert(media_urls.to_vec(), labels.clone());
        } else {
            warn!(
                "ReferenceLabels: {} of {} links for song {} fell back to positional labels",
                unresolved,
                labels.len(),
                song_id
            );
        }
        labels
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{LookupTitle, ReferenceLabel, ReferenceLabelResolver, TitleLookup};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Lookup with scripted titles; URLs without a script entry fail.
    #[derive(Default)]
    pub(crate) struct ScriptedLookup {
        pub(crate) titles: HashMap<String, String>,
        pub(crate) fail_batch: bool,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedLookup {
        pub(crate) fn with_titles(pairs: &[(&str, &str)]) -> Self {
            Self {
                titles: pairs
                    .iter()
                    .map(|(url, title)| (url.to_string(), title.to_string()))
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl TitleLookup for ScriptedLookup {
        fn lookup_titles(&self, urls: &[String]) -> Result<Vec<LookupTitle>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_batch {
                return Err("service unavailable".to_string());
            }
            Ok(urls
                .iter()
                .filter_map(|url| {
                    self.titles.get(url).map(|title| LookupTitle {
                        url: url.clone(),
                        title: title.clone(),
                        media_id: crate::media_link::extract_media_id(url).unwrap_or_default(),
                    })
                })
                .collect())
        }
    }

    fn urls() -> Vec<String> {
        vec![
            "https://youtu.be/aaaaaaaaaaa".to_string(),
            "https://youtu.be/bbbbbbbbbbb".to_string(),
            "https://youtu.be/ccccccccccc".to_string(),
        ]
    }

    /// Cache-first resolution the way the session drives the resolver.
    fn resolve(
        resolver: &mut ReferenceLabelResolver,
        urls: &[String],
        lookup: &ScriptedLookup,
    ) -> Vec<ReferenceLabel> {
        if let Some(cached) = resolver.cached(urls) {
            return cached.to_vec();
        }
        let result = lookup.lookup_titles(urls);
        resolver.complete("song-1", urls, &result)
    }

    #[test]
    fn test_partial_failure_falls_back_to_positional_label() {
        let lookup = ScriptedLookup::with_titles(&[
            ("https://youtu.be/aaaaaaaaaaa", "Live at Easter"),
            ("https://youtu.be/ccccccccccc", "Acoustic"),
        ]);
        let mut resolver = ReferenceLabelResolver::new();
        let labels = resolve(&mut resolver, &urls(), &lookup);

        let texts: Vec<&str> = labels.iter().map(|label| label.label.as_str()).collect();
        assert_eq!(texts, vec!["Live at Easter", "Reference 2", "Acoustic"]);
        assert_eq!(labels.iter().filter(|label| label.resolved).count(), 2);
        assert_eq!(labels[1].media_id.as_deref(), Some("bbbbbbbbbbb"));
    }

    #[test]
    fn test_batch_failure_labels_everything_positionally() {
        let lookup = ScriptedLookup {
            fail_batch: true,
            ..ScriptedLookup::default()
        };
        let mut resolver = ReferenceLabelResolver::new();
        let labels = resolve(&mut resolver, &urls(), &lookup);
        let texts: Vec<&str> = labels.iter().map(|label| label.label.as_str()).collect();
        assert_eq!(texts, vec!["Reference 1", "Reference 2", "Reference 3"]);
        assert!(resolver.is_empty());
    }

    #[test]
    fn test_fully_resolved_sets_are_cached() {
        let lookup = ScriptedLookup::with_titles(&[
            ("https://youtu.be/aaaaaaaaaaa", "One"),
            ("https://youtu.be/bbbbbbbbbbb", "Two"),
            ("https://youtu.be/ccccccccccc", "Three"),
        ]);
        let mut resolver = ReferenceLabelResolver::new();
        let first = resolve(&mut resolver, &urls(), &lookup);
        let second = resolve(&mut resolver, &urls(), &lookup);
        assert_eq!(first, second);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);

        resolver.clear();
        resolve(&mut resolver, &urls(), &lookup);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_blank_title_counts_as_unresolved() {
        let lookup = ScriptedLookup::with_titles(&[("https://youtu.be/aaaaaaaaaaa", "   ")]);
        let mut resolver = ReferenceLabelResolver::new();
        let labels = resolve(&mut resolver, &urls()[..1], &lookup);
        assert_eq!(labels[0].label, "Reference 1");
        assert!(!labels[0].resolved);
    }

    #[test]
    fn test_partially_resolved_sets_are_retried() {
        let lookup = ScriptedLookup::with_titles(&[("https://youtu.be/aaaaaaaaaaa", "One")]);
        let mut resolver = ReferenceLabelResolver::new();
        resolve(&mut resolver, &urls(), &lookup);
        assert!(resolver.cached(&urls()).is_none());
        resolve(&mut resolver, &urls(), &lookup);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }
}
