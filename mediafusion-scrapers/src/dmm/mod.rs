//! Client for hash-list / DMM ("Debrid Media Manager") search APIs:
//! a single `POST {base_url}/dmm/search` with a free-text query,
//! returning a flat list of `{infoHash, filename, filesize}` rows.
//! Grounded on the Zilean-style aggregator, which searches by title
//! text rather than by id and therefore needs a title-similarity guard
//! against the media it was asked to search for, since the backend has
//! no notion of which exact work a filename belongs to.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use mediafusion_core::error::ScrapeError;
use mediafusion_core::models::{InfoHash, Media, MediaKind};
use mediafusion_core::parser;
use mediafusion_core::scraper::{CandidateStream, Scraper};

/// Below this the matched filename is considered an unrelated result
/// and dropped, mirroring the 85% threshold the original aggregator
/// uses against the same kind of text-search backend.
const MIN_TITLE_SIMILARITY: f64 = 0.85;

pub struct DmmScraper {
    scraper_name: String,
    base_url: String,
    client: reqwest::Client,
    cache_ttl: Duration,
}

impl DmmScraper {
    #[must_use]
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, cache_ttl: Duration) -> Self {
        Self { scraper_name: name.into(), base_url: base_url.into(), client: reqwest::Client::new(), cache_ttl }
    }
}

#[async_trait]
impl Scraper for DmmScraper {
    fn name(&self) -> &str {
        &self.scraper_name
    }

    async fn scrape(
        &self,
        media: &Media,
        kind: MediaKind,
        season: Option<u32>,
        _episode: Option<u32>,
    ) -> Result<Vec<CandidateStream>, ScrapeError> {
        let url = format!("{}/dmm/search", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "queryText": media.title }))
            .send()
            .await
            .map_err(|err| ScrapeError::Transient(err.to_string()))?;

        if response.status().is_client_error() {
            return Err(ScrapeError::Permanent(format!("{url} returned {}", response.status())));
        }
        if !response.status().is_success() {
            return Err(ScrapeError::Transient(format!("{url} returned {}", response.status())));
        }

        let rows: Vec<RawResult> = response.json().await.map_err(|err| ScrapeError::Transient(err.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| to_candidate(row, media, kind, season))
            .collect())
    }

    fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(rename = "infoHash")]
    info_hash: String,
    filename: String,
    filesize: u64,
}

fn to_candidate(row: RawResult, media: &Media, kind: MediaKind, wanted_season: Option<u32>) -> Option<CandidateStream> {
    let info_hash = InfoHash::parse(&row.info_hash).ok()?;
    let parsed = parser::parse(&row.filename);

    if best_title_similarity(&parsed.title, media) < MIN_TITLE_SIMILARITY {
        return None;
    }

    if kind == MediaKind::Series {
        // A torrent spanning more than one season can't be attributed
        // to a single media row without a schema that tracks per-file
        // season membership, so it's dropped rather than guessed at.
        if parsed.seasons.len() != 1 {
            return None;
        }
        if let Some(wanted) = wanted_season {
            if parsed.seasons[0] != wanted {
                return None;
            }
        }
    }

    Some(CandidateStream {
        info_hash,
        display_name: row.filename,
        size_bytes: row.filesize,
        seeders: None,
        trackers: vec!["DMM".to_string()],
        seasons: parsed.seasons,
    })
}

/// Highest similarity ratio against the media's canonical title or any
/// of its `aka_titles` (a match against an alternate title is as good
/// as a match against the primary one).
fn best_title_similarity(candidate: &str, media: &Media) -> f64 {
    std::iter::once(media.title.as_str())
        .chain(media.aka_titles.iter().map(String::as_str))
        .map(|title| title_similarity(candidate, title))
        .fold(0.0_f64, f64::max)
}

/// Normalized Levenshtein similarity in `[0, 1]`, case-insensitive.
fn title_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(&a, &b) as f64 / max_len as f64)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.iter().enumerate() {
        let mut prev_diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let temp = row[j + 1];
            row[j + 1] = if ca == cb {
                prev_diag
            } else {
                1 + prev_diag.min(row[j]).min(row[j + 1])
            };
            prev_diag = temp;
        }
    }
    row[b.len()]
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

    #[test]
    fn identical_titles_are_fully_similar() {
        assert_eq!(title_similarity("The Matrix", "the matrix"), 1.0);
    }

    #[test]
    fn unrelated_titles_score_low() {
        assert!(title_similarity("The Matrix", "Completely Different Movie") < MIN_TITLE_SIMILARITY);
    }

    #[tokio::test]
    async fn drops_results_below_similarity_threshold() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dmm/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"infoHash": "a".repeat(40), "filename": "Totally.Unrelated.Movie.2020.1080p.mkv", "filesize": 1000},
            ])))
            .mount(&server)
            .await;

        let scraper = DmmScraper::new("zilean", server.uri(), Duration::from_secs(86400));
        let candidates = scraper.scrape(&media(), MediaKind::Movie, None, None).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn keeps_matching_movie_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dmm/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"infoHash": "b".repeat(40), "filename": "The.Matrix.1999.1080p.BluRay.mkv", "filesize": 2_000_000_000_u64},
            ])))
            .mount(&server)
            .await;

        let scraper = DmmScraper::new("zilean", server.uri(), Duration::from_secs(86400));
        let candidates = scraper.scrape(&media(), MediaKind::Movie, None, None).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].size_bytes, 2_000_000_000);
    }

    #[tokio::test]
    async fn series_result_spanning_multiple_seasons_is_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dmm/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"infoHash": "c".repeat(40), "filename": "The.Matrix.S01-S02.Complete.1080p.mkv", "filesize": 1000},
            ])))
            .mount(&server)
            .await;

        let scraper = DmmScraper::new("zilean", server.uri(), Duration::from_secs(86400));
        let candidates = scraper.scrape(&media(), MediaKind::Series, Some(1), None).await.unwrap();
        assert!(candidates.is_empty());
    }
}
