//! The cache and resilience decorators around a bare [`Scraper`] (§4.2).
//!
//! Both wrap `Scraper` and re-export it, so a scraper instance is built
//! once, at registry construction, as
//! `CacheDecoratedScraper::new(ResilientScraper::new(inner, ...), kv)` —
//! resilience closest to the network call, cache outermost.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{CandidateStream, Scraper};
use crate::error::ScrapeError;
use crate::models::{Media, MediaKind};
use crate::resilience::circuit_breaker::ScraperCircuitBreaker;
use crate::resilience::rate_limit::{self, ScraperRateLimiter};
use failsafe::CircuitBreaker as _;

/// Wraps a scraper with its token-bucket rate limiter and circuit
/// breaker (§4.2: "both are local to the scraper instance and shared
/// across concurrent requests within the process").
pub struct ResilientScraper<S: Scraper> {
    inner: S,
    limiter: ScraperRateLimiter,
    breaker: ScraperCircuitBreaker,
    deadline: Duration,
}

impl<S: Scraper> ResilientScraper<S> {
    #[must_use]
    pub fn new(inner: S, limiter: ScraperRateLimiter, breaker: ScraperCircuitBreaker, deadline: Duration) -> Self {
        Self { inner, limiter, breaker, deadline }
    }
}

#[async_trait]
impl<S: Scraper> Scraper for ResilientScraper<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn scrape(
        &self,
        media: &Media,
        kind: MediaKind,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Vec<CandidateStream>, ScrapeError> {
        if !self.breaker.is_call_permitted() {
            return Err(ScrapeError::CircuitOpen);
        }
        if !rate_limit::acquire_with_deadline(&self.limiter, self.deadline).await {
            return Err(ScrapeError::RateLimited);
        }

        match tokio::time::timeout(self.deadline, self.inner.scrape(media, kind, season, episode)).await {
            Ok(Ok(results)) => {
                self.breaker.on_success();
                Ok(results)
            }
            Ok(Err(err)) => {
                if !err.is_permanent() {
                    self.breaker.on_error();
                }
                Err(err)
            }
            Err(_) => {
                self.breaker.on_error();
                Err(ScrapeError::TimedOut)
            }
        }
    }

    fn cache_ttl(&self) -> Duration {
        self.inner.cache_ttl()
    }
}

/// Wraps a scraper with the result cache (§4.2): key is
/// `{scraper.name}:{kind}:{media_id}:{season?}:{episode?}`; on hit,
/// return cached; on miss, invoke then cache the full result.
pub struct CacheDecoratedScraper<S: Scraper> {
    inner: S,
    kv: Arc<dyn crate::cache::KvCache>,
}

impl<S: Scraper> CacheDecoratedScraper<S> {
    #[must_use]
    pub fn new(inner: S, kv: Arc<dyn crate::cache::KvCache>) -> Self {
        Self { inner, kv }
    }

    fn cache_key(&self, media: &Media, kind: MediaKind, season: Option<u32>, episode: Option<u32>) -> String {
        format!(
            "scrape:{}:{}:{}:{}:{}",
            self.inner.name(),
            kind.as_str(),
            media.id,
            season.map_or_else(String::new, |s| s.to_string()),
            episode.map_or_else(String::new, |e| e.to_string()),
        )
    }
}

#[async_trait]
impl<S: Scraper> Scraper for CacheDecoratedScraper<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn scrape(
        &self,
        media: &Media,
        kind: MediaKind,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Vec<CandidateStream>, ScrapeError> {
        let key = self.cache_key(media, kind, season, episode);

        match self.kv.get(&key).await {
            Ok(Some(bytes)) => {
                if let Ok(cached) = serde_json::from_slice::<Vec<CachedCandidate>>(&bytes) {
                    return Ok(cached.into_iter().filter_map(CachedCandidate::into_candidate).collect());
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(scraper = self.inner.name(), %err, "scrape cache read failed"),
        }

        let results = self.inner.scrape(media, kind, season, episode).await?;

        let cacheable: Vec<CachedCandidate> = results.iter().map(CachedCandidate::from_candidate).collect();
        if let Ok(bytes) = serde_json::to_vec(&cacheable) {
            let ttl = self.inner.cache_ttl().as_secs();
            if let Err(err) = self.kv.set(&key, &bytes, Some(ttl)).await {
                tracing::warn!(scraper = self.inner.name(), %err, "scrape cache write failed");
            }
        }

        Ok(results)
    }

    fn cache_ttl(&self) -> Duration {
        self.inner.cache_ttl()
    }
}

/// Wire form of [`CandidateStream`] — `InfoHash` is stored pre-validated,
/// so a deserialize failure here would mean cache corruption rather than
/// a normal parse error; such entries are silently skipped rather than
/// failing the whole lookup.
#[derive(serde::Serialize, serde::Deserialize)]
struct CachedCandidate {
    info_hash: String,
    display_name: String,
    size_bytes: u64,
    seeders: Option<u32>,
    trackers: Vec<String>,
    seasons: Vec<u32>,
}

impl CachedCandidate {
    fn from_candidate(c: &CandidateStream) -> Self {
        Self {
            info_hash: c.info_hash.as_str().to_string(),
            display_name: c.display_name.clone(),
            size_bytes: c.size_bytes,
            seeders: c.seeders,
            trackers: c.trackers.clone(),
            seasons: c.seasons.clone(),
        }
    }

    fn into_candidate(self) -> Option<CandidateStream> {
        let info_hash = crate::models::InfoHash::parse(&self.info_hash).ok()?;
        Some(CandidateStream {
            info_hash,
            display_name: self.display_name,
            size_bytes: self.size_bytes,
            seeders: self.seeders,
            trackers: self.trackers,
            seasons: self.seasons,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryKvCache;
    use crate::models::{ExternalId, InfoHash};
    use crate::resilience::{circuit_breaker, rate_limit};
    use crate::scraper::test_support::StubScraper;

    fn sample_media() -> Media {
        Media::new(ExternalId::synthetic("x"), MediaKind::Movie, "Sample".to_string(), Some(2020))
    }

    #[tokio::test]
    async fn cache_decorator_serves_second_call_from_cache() {
        let kv: Arc<dyn crate::cache::KvCache> = Arc::new(InMemoryKvCache::new());
        let stub = StubScraper {
            scraper_name: "stub",
            results: vec![CandidateStream {
                info_hash: InfoHash::parse(&"a".repeat(40)).unwrap(),
                display_name: "X".to_string(),
                size_bytes: 0,
                seeders: Some(5),
                trackers: vec![],
                seasons: vec![],
            }],
            error: None,
            delay: Duration::ZERO,
        };
        let decorated = CacheDecoratedScraper::new(stub, kv);
        let media = sample_media();

        let first = decorated.scrape(&media, MediaKind::Movie, None, None).await.unwrap();
        assert_eq!(first.len(), 1);

        let second = decorated.scrape(&media, MediaKind::Movie, None, None).await.unwrap();
        assert_eq!(second[0].info_hash, first[0].info_hash);
    }

    #[tokio::test]
    async fn circuit_breaker_trips_after_consecutive_errors() {
        let stub = StubScraper {
            scraper_name: "flaky",
            results: vec![],
            error: Some(ScrapeError::Transient("boom".to_string())),
            delay: Duration::ZERO,
        };
        let resilient = ResilientScraper::new(
            stub,
            rate_limit::create(1000),
            circuit_breaker::create(2, Duration::from_secs(30), Duration::from_secs(60)),
            Duration::from_secs(1),
        );
        let media = sample_media();

        assert!(resilient.scrape(&media, MediaKind::Movie, None, None).await.is_err());
        assert!(resilient.scrape(&media, MediaKind::Movie, None, None).await.is_err());
        let third = resilient.scrape(&media, MediaKind::Movie, None, None).await;
        assert!(matches!(third, Err(ScrapeError::CircuitOpen)));
    }

    #[tokio::test]
    async fn resilient_scraper_times_out_slow_calls() {
        let stub = StubScraper {
            scraper_name: "slow",
            results: vec![],
            error: None,
            delay: Duration::from_millis(200),
        };
        let resilient = ResilientScraper::new(
            stub,
            rate_limit::create(1000),
            circuit_breaker::create(5, Duration::from_secs(30), Duration::from_secs(60)),
            Duration::from_millis(20),
        );
        let media = sample_media();
        let result = resilient.scrape(&media, MediaKind::Movie, None, None).await;
        assert!(matches!(result, Err(ScrapeError::TimedOut)));
    }
}
