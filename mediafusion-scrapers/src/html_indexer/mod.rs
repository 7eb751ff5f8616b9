//! Client for forum-style torrent indexers with no JSON API: a search
//! page lists matching topics, and each topic page embeds one or more
//! `magnet:` links directly in the HTML. Grounded on the TamilBlasters-
//! style forum scraper (search listing -> per-topic page -> magnet
//! anchors) and on the `scraper` crate's `Html`/`Selector` idiom for
//! the actual DOM queries.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use mediafusion_core::error::ScrapeError;
use mediafusion_core::models::{InfoHash, Media, MediaKind};
use mediafusion_core::parser;
use mediafusion_core::scraper::{CandidateStream, Scraper};

static RE_BTIH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)btih:([0-9a-f]{40})").unwrap());

pub struct HtmlIndexerScraper {
    scraper_name: String,
    base_url: String,
    client: reqwest::Client,
    cache_ttl: Duration,
    max_results: usize,
}

impl HtmlIndexerScraper {
    #[must_use]
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, cache_ttl: Duration) -> Self {
        Self {
            scraper_name: name.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            cache_ttl,
            max_results: 10,
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/index.php?/search/&q={}&type=forums_topic&search_and_or=or&search_in=titles",
            self.base_url.trim_end_matches('/'),
            urlencoding_lite(query),
        )
    }

    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self.client.get(url).send().await.map_err(|err| ScrapeError::Transient(err.to_string()))?;
        if response.status().is_client_error() {
            return Err(ScrapeError::Permanent(format!("{url} returned {}", response.status())));
        }
        if !response.status().is_success() {
            return Err(ScrapeError::Transient(format!("{url} returned {}", response.status())));
        }
        response.text().await.map_err(|err| ScrapeError::Transient(err.to_string()))
    }
}

#[async_trait]
impl Scraper for HtmlIndexerScraper {
    fn name(&self) -> &str {
        &self.scraper_name
    }

    async fn scrape(
        &self,
        media: &Media,
        _kind: MediaKind,
        _season: Option<u32>,
        _episode: Option<u32>,
    ) -> Result<Vec<CandidateStream>, ScrapeError> {
        let search_html = self.fetch(&self.search_url(&media.title)).await?;
        let topic_links = extract_topic_links(&search_html, &self.base_url);

        let mut candidates = Vec::new();
        for link in topic_links.into_iter().take(self.max_results) {
            let topic_html = match self.fetch(&link).await {
                Ok(html) => html,
                Err(err) => {
                    tracing::warn!(scraper = %self.scraper_name, %link, %err, "failed to fetch topic page, skipping");
                    continue;
                }
            };
            candidates.extend(extract_candidates_from_topic(&topic_html, &self.scraper_name));
        }

        Ok(candidates)
    }

    fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }
}

fn extract_topic_links(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(link_selector) = Selector::parse("a[data-linktype='link']") else {
        return Vec::new();
    };

    document
        .select(&link_selector)
        .filter_map(|el| el.value().attr("href"))
        .map(|href| resolve_url(base_url, href))
        .collect()
}

fn extract_candidates_from_topic(html: &str, source: &str) -> Vec<CandidateStream> {
    let document = Html::parse_document(html);
    let Ok(magnet_selector) = Selector::parse("a.magnet-plugin") else {
        return Vec::new();
    };

    document
        .select(&magnet_selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| to_candidate(href, source))
        .collect()
}

fn to_candidate(magnet_href: &str, source: &str) -> Option<CandidateStream> {
    let info_hash = InfoHash::parse(&RE_BTIH.captures(magnet_href)?[1]).ok()?;
    let display_name = magnet_display_name(magnet_href).unwrap_or_else(|| info_hash.as_str().to_string());
    let parsed = parser::parse(&display_name);

    Some(CandidateStream {
        info_hash,
        display_name,
        size_bytes: 0,
        seeders: None,
        trackers: vec![source.to_string()],
        seasons: parsed.seasons,
    })
}

fn magnet_display_name(magnet_href: &str) -> Option<String> {
    magnet_href.split('&').find_map(|segment| segment.strip_prefix("dn=")).map(|dn| dn.replace('+', " "))
}

fn resolve_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href.trim_start_matches('/'))
    }
}

/// Minimal percent-encoding for the single query parameter this client
/// builds; full `url::form_urlencoded` is reserved for providers that
/// need general query-string construction.
fn urlencoding_lite(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_string() } else { format!("%{:02X}", c as u32) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediafusion_core::models::ExternalId;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn media() -> Media {
        Media::new(ExternalId::synthetic("seed"), MediaKind::Movie, "The Matrix".to_string(), Some(1999))
    }

    #[test]
    fn extracts_info_hash_from_btih_magnet() {
        let href = format!("magnet:?xt=urn:btih:{}&dn=The.Matrix.1999.1080p", "a".repeat(40));
        let candidate = to_candidate(&href, "TamilBlasters").unwrap();
        assert_eq!(candidate.info_hash.as_str(), "a".repeat(40));
        assert_eq!(candidate.display_name, "The.Matrix.1999.1080p");
    }

    #[test]
    fn non_magnet_href_yields_no_candidate() {
        assert!(to_candidate("https://example.invalid/file.torrent", "TamilBlasters").is_none());
    }

    #[test]
    fn relative_href_is_resolved_against_base_url() {
        assert_eq!(resolve_url("https://example.invalid", "/forums/topic/1"), "https://example.invalid/forums/topic/1");
    }

    #[tokio::test]
    async fn full_search_then_topic_crawl_yields_candidates() {
        let server = MockServer::start().await;
        let topic_url = format!("{}/forums/topic/1", server.uri());

        Mock::given(method("GET"))
            .and(path_regex(r"^/index\.php$"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<html><body><a data-linktype="link" href="{topic_url}">The Matrix</a></body></html>"#
            )))
            .mount(&server)
            .await;

        let magnet = format!("magnet:?xt=urn:btih:{}&dn=The.Matrix.1999.1080p", "b".repeat(40));
        Mock::given(method("GET"))
            .and(path_regex(r"^/forums/topic/1$"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<html><body><a class="magnet-plugin" href="{magnet}">magnet</a></body></html>"#
            )))
            .mount(&server)
            .await;

        let scraper = HtmlIndexerScraper::new("tamil_blasters", server.uri(), Duration::from_secs(3600));
        let candidates = scraper.scrape(&media(), MediaKind::Movie, None, None).await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].info_hash.as_str(), "b".repeat(40));
    }
}
