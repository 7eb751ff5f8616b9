//! Client for plain RSS torrent feeds (Nyaa-style): one `GET` against
//! a feed URL, then a streaming XML walk over `<item>` elements
//! pulling `title`/`link`/`guid` text out looking for a `btih:` hash.
//! Grounded on a `quick_xml::Reader` event-loop RSS parser.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use mediafusion_core::error::ScrapeError;
use mediafusion_core::models::{InfoHash, Media, MediaKind};
use mediafusion_core::parser;
use mediafusion_core::scraper::{CandidateStream, Scraper};

static RE_BTIH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)btih:([0-9a-f]{40})").unwrap());

pub struct RssFeedScraper {
    scraper_name: String,
    feed_url_template: String,
    client: reqwest::Client,
    cache_ttl: Duration,
}

impl RssFeedScraper {
    /// `feed_url_template` contains one `{query}` placeholder, e.g.
    /// `"https://nyaa.si/?page=rss&q={query}&c=1_2&f=0"`.
    #[must_use]
    pub fn new(name: impl Into<String>, feed_url_template: impl Into<String>, cache_ttl: Duration) -> Self {
        Self { scraper_name: name.into(), feed_url_template: feed_url_template.into(), client: reqwest::Client::new(), cache_ttl }
    }

    fn feed_url(&self, query: &str) -> String {
        self.feed_url_template.replace("{query}", &urlencoding_lite(query))
    }
}

#[async_trait]
impl Scraper for RssFeedScraper {
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
        let url = self.feed_url(&media.title);

        let response = self.client.get(&url).send().await.map_err(|err| ScrapeError::Transient(err.to_string()))?;
        if response.status().is_client_error() {
            return Err(ScrapeError::Permanent(format!("{url} returned {}", response.status())));
        }
        if !response.status().is_success() {
            return Err(ScrapeError::Transient(format!("{url} returned {}", response.status())));
        }

        let xml = response.text().await.map_err(|err| ScrapeError::Transient(err.to_string()))?;
        let items = parse_rss_items(&xml).map_err(|err| ScrapeError::Transient(err.to_string()))?;

        Ok(items.into_iter().filter_map(|item| to_candidate(item, &self.scraper_name)).collect())
    }

    fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }
}

#[derive(Debug, Default)]
struct RssItem {
    title: String,
    link: String,
    guid: String,
}

fn parse_rss_items(xml: &str) -> Result<Vec<RssItem>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut buf = Vec::new();
    let mut current: Option<RssItem> = None;
    let mut in_element: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    current = Some(RssItem::default());
                } else {
                    in_element = Some(name);
                }
            }
            Event::Text(e) => {
                if let (Some(item), Some(element)) = (current.as_mut(), in_element.as_deref()) {
                    let text = e.unescape()?.into_owned();
                    match element {
                        "title" => item.title = text,
                        "link" => item.link = text,
                        "guid" => item.guid = text,
                        _ => {}
                    }
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                } else if in_element.as_deref() == Some(name.as_str()) {
                    in_element = None;
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

fn to_candidate(item: RssItem, source: &str) -> Option<CandidateStream> {
    let info_hash = [&item.link, &item.guid, &item.title]
        .into_iter()
        .find_map(|field| RE_BTIH.captures(field))
        .and_then(|caps| InfoHash::parse(&caps[1]).ok())?;

    let parsed = parser::parse(&item.title);

    Some(CandidateStream {
        info_hash,
        display_name: item.title,
        size_bytes: 0,
        seeders: None,
        trackers: vec![source.to_string()],
        seasons: parsed.seasons,
    })
}

fn urlencoding_lite(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_string() } else { format!("%{:02X}", c as u32) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediafusion_core::models::ExternalId;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn media() -> Media {
        Media::new(ExternalId::synthetic("seed"), MediaKind::Series, "One Piece".to_string(), None)
    }

    #[test]
    fn parses_items_from_minimal_rss() {
        let hash = "c".repeat(40);
        let xml = format!(
            r#"<rss><channel><item><title>One.Piece.1090.1080p</title><link>magnet:?xt=urn:btih:{hash}</link><guid>g1</guid></item></channel></rss>"#
        );
        let items = parse_rss_items(&xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "One.Piece.1090.1080p");
    }

    #[tokio::test]
    async fn fetches_and_converts_feed_items_to_candidates() {
        let server = MockServer::start().await;
        let hash = "d".repeat(40);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<rss><channel><item><title>One.Piece.1090.1080p</title><link>magnet:?xt=urn:btih:{hash}</link></item></channel></rss>"#
            )))
            .mount(&server)
            .await;

        let scraper = RssFeedScraper::new("nyaa", format!("{}/?q={{query}}", server.uri()), Duration::from_secs(1800));
        let candidates = scraper.scrape(&media(), MediaKind::Series, None, None).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].info_hash.as_str(), hash);
    }

    #[test]
    fn item_without_recognizable_hash_is_dropped() {
        let item = RssItem { title: "No hash here".to_string(), link: "https://example.invalid".to_string(), guid: String::new() };
        assert!(to_candidate(item, "nyaa").is_none());
    }
}
