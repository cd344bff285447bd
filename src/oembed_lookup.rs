//! oEmbed-backed title lookup.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::{debug, warn};
use serde_json::Value;

use crate::config::LookupConfig;
use crate::media_link;
use crate::reference_labels::{LookupTitle, TitleLookup};

/// Title lookup backed by `ureq`, one oEmbed request per link.
pub struct OEmbedTitleLookup {
    http_client: ureq::Agent,
    endpoint: String,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    clock: DefaultClock,
}

impl OEmbedTitleLookup {
    pub fn new(config: &LookupConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5).min(timeout))
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        let quota = Quota::with_period(Duration::from_millis(config.min_interval_ms.max(1)))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);
        Self {
            http_client,
            endpoint: endpoint_base(&config.endpoint),
            limiter: RateLimiter::direct(quota),
            clock: DefaultClock::default(),
        }
    }

    fn wait_for_slot(&self) {
        while let Err(not_until) = self.limiter.check() {
            std::thread::sleep(not_until.wait_time_from(self.clock.now()));
        }
    }

    fn lookup_one(&self, url: &str) -> Result<LookupTitle, String> {
        self.wait_for_slot();
        let request_url = oembed_request_url(&self.endpoint, url);
        let response = self
            .http_client
            .get(&request_url)
            .call()
            .map_err(|err| format!("oEmbed request failed for {url}: {err}"))?;
        let payload: Value = response
            .into_json()
            .map_err(|err| format!("oEmbed response parse failed for {url}: {err}"))?;
        let title = parse_oembed_title(&payload)
            .ok_or_else(|| format!("oEmbed response for {url} has no title"))?;
        Ok(LookupTitle {
            url: url.to_string(),
            title,
            media_id: media_link::extract_media_id(url).unwrap_or_default(),
        })
    }
}

impl TitleLookup for OEmbedTitleLookup {
    fn lookup_titles(&self, urls: &[String]) -> Result<Vec<LookupTitle>, String> {
        let mut resolved = Vec::with_capacity(urls.len());
        let mut last_error = None;
        for url in urls {
            match self.lookup_one(url) {
                Ok(title) => {
                    debug!("OEmbedLookup: {} -> '{}'", url, title.title);
                    resolved.push(title);
                }
                Err(err) => {
                    warn!("OEmbedLookup: {}", err);
                    last_error = Some(err);
                }
            }
        }
        match last_error {
            Some(err) if resolved.is_empty() => Err(err),
            _ => Ok(resolved),
        }
    }
}

fn endpoint_base(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}

fn oembed_request_url(endpoint: &str, url: &str) -> String {
    format!("{}?url={}&format=json", endpoint, urlencoding::encode(url.trim()))
}

fn parse_oembed_title(payload: &Value) -> Option<String> {
    payload
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::{endpoint_base, oembed_request_url, parse_oembed_title};
    use serde_json::json;

    #[test]
    fn test_request_url_encodes_link() {
        let url = oembed_request_url(
            &endpoint_base("https://www.youtube.com/oembed/ "),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=5",
        );
        assert_eq!(
            url,
            "https://www.youtube.com/oembed?url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3DdQw4w9WgXcQ%26t%3D5&format=json"
        );
    }

    #[test]
    fn test_parse_title_trims_and_rejects_blank() {
        assert_eq!(
            parse_oembed_title(&json!({ "title": "  Hymn (Live)  ", "author_name": "Choir" })),
            Some("Hymn (Live)".to_string())
        );
        assert_eq!(parse_oembed_title(&json!({ "title": "   " })), None);
        assert_eq!(parse_oembed_title(&json!({ "html": "<iframe>" })), None);
    }
}
