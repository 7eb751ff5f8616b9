//! Scraper Orchestrator (§4.3): parallel fan-out across enabled
//! scrapers, partial-failure-tolerant aggregation into `Stream`s.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use super::{CandidateStream, Scraper};
use crate::models::{Media, MediaKind, Stream, StreamPayload};
use crate::parser;

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Per-request deadline (§4.3 default 30s). Structured: dropping the
    /// future returned by `run_scrapers` cancels every in-flight
    /// scraper task via `JoinSet`'s drop glue.
    pub deadline: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { deadline: Duration::from_secs(30) }
    }
}

/// Fan out `media`'s lookup across every scraper in `scrapers`, union the
/// results keyed by info-hash, and return ready-to-persist `Stream`s.
///
/// Any scraper that errors or blows its deadline is logged and dropped;
/// this function only returns an error-free result, per §4.3's "the
/// orchestrator never fails the overall call because of a single
/// scraper".
pub async fn run_scrapers(
    media: &Media,
    kind: MediaKind,
    season: Option<u32>,
    episode: Option<u32>,
    scrapers: &[Arc<dyn Scraper>],
    config: OrchestratorConfig,
) -> Vec<Stream> {
    let mut joins: JoinSet<(String, Result<Vec<CandidateStream>, ()>)> = JoinSet::new();

    for scraper in scrapers {
        let scraper = scraper.clone();
        let media = media.clone();
        let deadline = config.deadline;
        joins.spawn(async move {
            let name = scraper.name().to_string();
            let result = tokio::time::timeout(deadline, scraper.scrape(&media, kind, season, episode)).await;
            match result {
                Ok(Ok(candidates)) => (name, Ok(candidates)),
                Ok(Err(err)) => {
                    tracing::warn!(scraper = %name, error = %err, "scraper call failed, dropping");
                    (name, Err(()))
                }
                Err(_) => {
                    tracing::warn!(scraper = %name, "scraper exceeded orchestrator deadline, dropping");
                    (name, Err(()))
                }
            }
        });
    }

    // (info_hash -> (display_index, Stream)); display_index preserves
    // first-seen order so conflicting scrapers append rather than reorder.
    let mut merged: HashMap<String, Stream> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    while let Some(joined) = joins.join_next().await {
        let (scraper_name, outcome) = match joined {
            Ok(pair) => pair,
            Err(join_err) => {
                tracing::warn!(error = %join_err, "scraper task panicked, dropping");
                continue;
            }
        };
        let Ok(candidates) = outcome else { continue };

        for candidate in candidates {
            let hash_key = candidate.info_hash.as_str().to_string();
            match merged.get_mut(&hash_key) {
                Some(existing) => {
                    if !existing.sources.contains(&scraper_name) {
                        existing.sources.push(scraper_name.clone());
                    }
                }
                None => {
                    order.push(hash_key.clone());
                    merged.insert(hash_key, candidate_to_stream(candidate, &scraper_name));
                }
            }
        }
    }

    order.into_iter().filter_map(|key| merged.remove(&key)).collect()
}

/// Convert a scraper's raw `CandidateStream` into a persistable `Stream`
/// by running the title parser over its display name (§4.1, §4.3).
pub(crate) fn candidate_to_stream(candidate: CandidateStream, source: &str) -> Stream {
    let parsed = parser::parse(&candidate.display_name);
    let now = chrono::Utc::now();

    let mut seasons: std::collections::HashSet<u32> = parsed.seasons.iter().copied().collect();
    seasons.extend(candidate.seasons.iter().copied());

    Stream {
        info_hash: candidate.info_hash,
        display_name: candidate.display_name,
        sources: vec![source.to_string()],
        payload: StreamPayload::Torrent { magnet_trackers: candidate.trackers.clone() },
        size_bytes: candidate.size_bytes,
        resolution: parsed.resolution,
        quality: parsed.quality,
        audio_formats: parsed.audio.into_iter().collect(),
        hdr_formats: parsed.hdr.into_iter().collect(),
        channels: parsed.channels.into_iter().collect(),
        languages: parsed.languages.into_iter().collect(),
        is_remux: parsed.is_remux,
        is_proper: parsed.is_proper,
        is_repack: parsed.is_repack,
        is_extended: parsed.is_extended,
        is_dubbed: parsed.is_dubbed,
        is_subbed: parsed.is_subbed,
        is_complete: parsed.is_complete,
        seeders: candidate.seeders,
        trackers: candidate.trackers,
        created_at: now,
        updated_at: now,
        is_active: true,
        is_blocked: false,
        vote_score: 0,
        playback_count: 0,
        seasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::models::{ExternalId, InfoHash};
    use crate::scraper::test_support::StubScraper;

    fn media() -> Media {
        Media::new(ExternalId::synthetic("x"), MediaKind::Movie, "Sample".to_string(), Some(2020))
    }

    fn candidate(hash: char) -> CandidateStream {
        CandidateStream {
            info_hash: InfoHash::parse(&hash.to_string().repeat(40)).unwrap(),
            display_name: "Sample.2020.1080p.WEB-DL.x264-GROUP".to_string(),
            size_bytes: 1_000_000,
            seeders: Some(10),
            trackers: vec!["udp://tracker".to_string()],
            seasons: vec![],
        }
    }

    #[tokio::test]
    async fn aggregates_across_scrapers_with_source_tag_union() {
        let a: Arc<dyn Scraper> = Arc::new(StubScraper {
            scraper_name: "a",
            results: vec![candidate('a')],
            error: None,
            delay: Duration::ZERO,
        });
        let b: Arc<dyn Scraper> = Arc::new(StubScraper {
            scraper_name: "b",
            results: vec![candidate('a')],
            error: None,
            delay: Duration::ZERO,
        });

        let streams = run_scrapers(&media(), MediaKind::Movie, None, None, &[a, b], OrchestratorConfig::default()).await;

        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].sources.len(), 2);
        assert!(streams[0].sources.contains(&"a".to_string()));
        assert!(streams[0].sources.contains(&"b".to_string()));
    }

    #[tokio::test]
    async fn failing_scraper_is_dropped_without_failing_the_call() {
        let ok: Arc<dyn Scraper> = Arc::new(StubScraper {
            scraper_name: "ok",
            results: vec![candidate('a')],
            error: None,
            delay: Duration::ZERO,
        });
        let broken: Arc<dyn Scraper> = Arc::new(StubScraper {
            scraper_name: "broken",
            results: vec![],
            error: Some(ScrapeError::Permanent("down".to_string())),
            delay: Duration::ZERO,
        });

        let streams =
            run_scrapers(&media(), MediaKind::Movie, None, None, &[ok, broken], OrchestratorConfig::default()).await;

        assert_eq!(streams.len(), 1);
    }

    #[tokio::test]
    async fn slow_scraper_is_dropped_past_the_deadline() {
        let slow: Arc<dyn Scraper> = Arc::new(StubScraper {
            scraper_name: "slow",
            results: vec![candidate('a')],
            error: None,
            delay: Duration::from_millis(100),
        });

        let config = OrchestratorConfig { deadline: Duration::from_millis(10) };
        let streams = run_scrapers(&media(), MediaKind::Movie, None, None, &[slow], config).await;

        assert!(streams.is_empty());
    }

    #[tokio::test]
    async fn parses_display_name_into_stream_fields() {
        let scraper: Arc<dyn Scraper> = Arc::new(StubScraper {
            scraper_name: "a",
            results: vec![candidate('a')],
            error: None,
            delay: Duration::ZERO,
        });

        let streams =
            run_scrapers(&media(), MediaKind::Movie, None, None, &[scraper], OrchestratorConfig::default()).await;

        assert_eq!(streams[0].resolution.as_deref(), Some("1080p"));
    }
}
