//! Recognition of embeddable media links.
//!
//! Both the player controller and the reference-label resolver go through
//! this module, so there is exactly one definition of "playable link".

const MEDIA_ID_LEN: usize = 11;
const WATCH_HOSTS: [&str; 4] = [
    "youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
];
const SHORT_HOST: &str = "youtu.be";
const PATH_PREFIXES: [&str; 4] = ["embed", "shorts", "live", "v"];

fn is_valid_media_id(candidate: &str) -> bool {
    candidate.len() == MEDIA_ID_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn split_host(url: &str) -> Option<(String, &str)> {
    let trimmed = url.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .or_else(|| trimmed.strip_prefix("//"))
        .unwrap_or(trimmed);
    let split_at = without_scheme
        .find(['/', '?', '#'])
        .unwrap_or(without_scheme.len());
    let (authority, rest) = without_scheme.split_at(split_at);
    let host = authority
        .rsplit('@')
        .next()?
        .split(':')
        .next()?
        .to_ascii_lowercase();
    let host = host.trim_start_matches("www.").to_string();
    if host.is_empty() {
        return None;
    }
    Some((host, rest))
}

fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name != key {
            return None;
        }
        urlencoding::decode(value).ok().map(|decoded| decoded.to_string())
    })
}

/// Extracts the media id from a recognized media link.
pub fn extract_media_id(url: &str) -> Option<String> {
    let (host, rest) = split_host(url)?;
    let rest = rest.split('#').next().unwrap_or_default();
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());

    let candidate = if host == SHORT_HOST {
        segments.next()?.to_string()
    } else if WATCH_HOSTS.contains(&host.as_str()) {
        match segments.next()? {
            "watch" => query_param(query, "v")?,
            prefix if PATH_PREFIXES.contains(&prefix) => segments.next()?.to_string(),
            _ => return None,
        }
    } else {
        return None;
    };

    is_valid_media_id(&candidate).then_some(candidate)
}

pub fn is_media_link(url: &str) -> bool {
    extract_media_id(url).is_some()
}

/// Filters `links` down to recognized media links, preserving order.
pub fn media_links(links: &[String]) -> Vec<String> {
    links
        .iter()
        .filter(|link| is_media_link(link))
        .cloned()
        .collect()
}
