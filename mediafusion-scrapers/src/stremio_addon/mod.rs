//! Generic client for addons that speak the Stremio addon stream
//! protocol (`GET /stream/{type}/{id}.json`), grounded on the
//! Torrentio-style addon aggregator: every result line packs a
//! display name, a 👤 seeder count and a 💾 size into one free-text
//! description rather than separate JSON fields, so most of this
//! module is pulling those back apart.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use mediafusion_core::error::ScrapeError;
use mediafusion_core::models::{InfoHash, Media, MediaKind};
use mediafusion_core::parser::parse_size_string;
use mediafusion_core::scraper::{CandidateStream, Scraper};

static RE_SEEDERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"👤\s*(\d+)").unwrap());
static RE_SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"💾\s*([\d.,]+\s*[A-Za-z]+)").unwrap());
static RE_SOURCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"⚙️\s*(.+)$").unwrap());

pub struct StremioAddonScraper {
    scraper_name: String,
    base_url: String,
    client: reqwest::Client,
    cache_ttl: Duration,
}

impl StremioAddonScraper {
    #[must_use]
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, cache_ttl: Duration) -> Self {
        Self {
            scraper_name: name.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            cache_ttl,
        }
    }

    fn stream_url(&self, kind: MediaKind, media: &Media, season: Option<u32>, episode: Option<u32>) -> String {
        let type_segment = match kind {
            MediaKind::Series => "series",
            MediaKind::Movie | MediaKind::Tv | MediaKind::Event => "movie",
        };
        let id_segment = match (season, episode) {
            (Some(s), Some(e)) => format!("{}:{s}:{e}", media.external_id),
            _ => media.external_id.to_string(),
        };
        format!("{}/stream/{type_segment}/{id_segment}.json", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Scraper for StremioAddonScraper {
    fn name(&self) -> &str {
        &self.scraper_name
    }

    async fn scrape(
        &self,
        media: &Media,
        kind: MediaKind,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Vec<CandidateStream>, ScrapeError> {
        let url = self.stream_url(kind, media, season, episode);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| ScrapeError::Transient(err.to_string()))?;

        if response.status().is_client_error() {
            return Err(ScrapeError::Permanent(format!("{} returned {}", url, response.status())));
        }
        if !response.status().is_success() {
            return Err(ScrapeError::Transient(format!("{} returned {}", url, response.status())));
        }

        let body: StreamResponse = response
            .json()
            .await
            .map_err(|err| ScrapeError::Transient(err.to_string()))?;

        Ok(body.streams.iter().filter_map(|raw| to_candidate(raw, &self.scraper_name)).collect())
    }

    fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    streams: Vec<RawStream>,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "infoHash", default)]
    info_hash: Option<String>,
    #[serde(rename = "behaviorHints", default)]
    behavior_hints: Option<BehaviorHints>,
}

#[derive(Debug, Deserialize)]
struct BehaviorHints {
    #[serde(default)]
    filename: Option<String>,
}

fn to_candidate(raw: &RawStream, addon_name: &str) -> Option<CandidateStream> {
    let info_hash = InfoHash::parse(raw.info_hash.as_deref()?).ok()?;
    let description = raw.title.clone().or_else(|| raw.description.clone()).unwrap_or_default();

    let display_name = raw
        .behavior_hints
        .as_ref()
        .and_then(|hints| hints.filename.clone())
        .or_else(|| description.lines().next().map(str::to_string))
        .unwrap_or_else(|| description.clone());

    let size_bytes = RE_SIZE
        .captures(&description)
        .and_then(|caps| parse_size_string(&caps[1]))
        .unwrap_or(0);
    let seeders = RE_SEEDERS.captures(&description).and_then(|caps| caps[1].parse().ok());

    let source = RE_SOURCE
        .captures(&description)
        .map(|caps| caps[1].trim().to_string())
        .or_else(|| raw.name.clone())
        .unwrap_or_else(|| addon_name.to_string());

    Some(CandidateStream {
        info_hash,
        display_name,
        size_bytes,
        seeders,
        trackers: vec![source],
        seasons: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediafusion_core::models::ExternalId;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn media() -> Media {
        Media::new(ExternalId("tt0133093".to_string()), MediaKind::Movie, "The Matrix".to_string(), Some(1999))
    }

    #[tokio::test]
    async fn parses_streams_from_addon_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stream/movie/tt0133093.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "streams": [{
                    "name": "Torrentio",
                    "title": "The.Matrix.1999.1080p.BluRay\n👤 42 💾 1.5 GB ⚙️ Torrentio | RARBG",
                    "infoHash": "a".repeat(40),
                }]
            })))
            .mount(&server)
            .await;

        let scraper = StremioAddonScraper::new("torrentio", server.uri(), Duration::from_secs(3600));
        let candidates = scraper.scrape(&media(), MediaKind::Movie, None, None).await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].seeders, Some(42));
        assert_eq!(candidates[0].size_bytes, (1.5 * 1024.0 * 1024.0 * 1024.0) as u64);
        assert_eq!(candidates[0].trackers, vec!["RARBG".to_string()]);
    }

    #[tokio::test]
    async fn non_client_error_status_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let scraper = StremioAddonScraper::new("torrentio", server.uri(), Duration::from_secs(3600));
        let err = scraper.scrape(&media(), MediaKind::Movie, None, None).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Transient(_)));
    }

    #[tokio::test]
    async fn client_error_status_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let scraper = StremioAddonScraper::new("torrentio", server.uri(), Duration::from_secs(3600));
        let err = scraper.scrape(&media(), MediaKind::Movie, None, None).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Permanent(_)));
    }

    #[test]
    fn series_url_includes_season_and_episode() {
        let scraper = StremioAddonScraper::new("torrentio", "https://example.invalid", Duration::from_secs(1));
        let url = scraper.stream_url(MediaKind::Series, &media(), Some(2), Some(5));
        assert_eq!(url, "https://example.invalid/stream/series/tt0133093:2:5.json");
    }
}
