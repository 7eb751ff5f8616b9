//! Scraper Plugin Contract (§4.2) and Scraper Orchestrator (§4.3).

mod decorator;
mod orchestrator;
mod registry;
mod schedule;

pub use decorator::{CacheDecoratedScraper, ResilientScraper};
pub use orchestrator::{run_scrapers, OrchestratorConfig};
pub use registry::ScraperRegistry;
pub use schedule::{run_scheduled_scrape, ScrapeMetrics};

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ScrapeError;
use crate::models::{InfoHash, Media, MediaKind};

/// The pre-Stream-Store form a scraper produces (§4.2 `CandidateStream`).
/// Enough to be persisted; scrapers may enrich seeders/size but must
/// always provide an info-hash (or equivalent native id).
#[derive(Debug, Clone)]
pub struct CandidateStream {
    pub info_hash: InfoHash,
    pub display_name: String,
    pub size_bytes: u64,
    pub seeders: Option<u32>,
    pub trackers: Vec<String>,
    pub seasons: Vec<u32>,
}

/// A value-typed scraper implementation (§4.2).
///
/// `scrape` may only fail for unrecoverable configuration problems — "no
/// results" is `Ok(vec![])`, never an error.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Stable identifier, used as cache-key prefix.
    fn name(&self) -> &str;

    async fn scrape(
        &self,
        media: &Media,
        kind: MediaKind,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Vec<CandidateStream>, ScrapeError>;

    fn cache_ttl(&self) -> Duration;
}
