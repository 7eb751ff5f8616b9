//! Background ingest path (§6 "from the scheduler"): a single named
//! scraper run against known media, upserted into the stream store,
//! counted into a [`ScrapeMetrics`] record the scheduler logs per run.
//!
//! Distinct from [`super::orchestrator::run_scrapers`], which fans a
//! single request out across every enabled scraper against one media
//! row. This walks many media rows through one scraper, the shape a
//! cron-triggered catalog re-check needs.

use crate::error::ScrapeError;
use crate::models::MediaKind;
use crate::store::{MediaStore, StreamStore, UpsertOutcome};

use super::orchestrator::candidate_to_stream;
use super::registry::ScraperRegistry;

/// How many recently-touched media rows an incremental (`scrape_all =
/// false`) pass checks. `scrape_all = true` checks every row instead.
const INCREMENTAL_WORKLIST_LIMIT: i64 = 500;

/// Counts of what a scheduled scrape run did, returned to the caller
/// rather than just logged, so a scheduler can alert on `errored`
/// staying nonzero across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeMetrics {
    pub new: u32,
    pub updated: u32,
    pub blocked: u32,
    pub errored: u32,
}

/// Runs `scraper_name` against the media catalog and upserts whatever it
/// finds. `scrape_all` selects the full catalog instead of just the
/// recently-touched tail (mirrors the source scrapers' own
/// `scrape_all` toggle between a full crawl and an incremental one).
pub async fn run_scheduled_scrape(
    registry: &ScraperRegistry,
    media_store: &MediaStore,
    stream_store: &StreamStore,
    scraper_name: &str,
    scrape_all: bool,
) -> Result<ScrapeMetrics, ScrapeError> {
    let scraper = registry
        .get(scraper_name)
        .ok_or_else(|| ScrapeError::Configuration(format!("unknown scraper: {scraper_name}")))?;

    let worklist = if scrape_all {
        media_store.list_all().await
    } else {
        media_store.list_recently_active(INCREMENTAL_WORKLIST_LIMIT).await
    }
    .map_err(|err| ScrapeError::Transient(err.to_string()))?;

    let mut metrics = ScrapeMetrics::default();

    for media in worklist {
        let season = if media.kind == MediaKind::Series { Some(1) } else { None };
        let candidates = match scraper.scrape(&media, media.kind, season, None).await {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::warn!(scraper = scraper.name(), media = %media.external_id.as_str(), error = %err, "scheduled scrape failed for media row");
                metrics.errored += 1;
                continue;
            }
        };

        for candidate in candidates {
            let stream = candidate_to_stream(candidate, scraper.name());
            match stream_store.upsert(stream, media.id).await {
                Ok((_, UpsertOutcome::New)) => metrics.new += 1,
                Ok((_, UpsertOutcome::Updated)) => metrics.updated += 1,
                Ok((_, UpsertOutcome::Blocked)) => metrics.blocked += 1,
                Err(err) => {
                    tracing::warn!(scraper = scraper.name(), media = %media.external_id.as_str(), error = %err, "failed to persist scraped stream");
                    metrics.errored += 1;
                }
            }
        }
    }

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::test_support::StubScraper;
    use std::sync::Arc;
    use std::time::Duration;

    // `run_scheduled_scrape` needs a live `PgPool` via `MediaStore`/
    // `StreamStore`, which isn't available to a unit test here (no
    // store in this crate is exercised against a real database outside
    // integration tests); these cases cover the registry-resolution and
    // metrics-shape pieces that don't require one.

    #[test]
    fn registry_lookup_fails_for_unknown_scraper_name() {
        let registry = ScraperRegistry::new();
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn registry_lookup_succeeds_for_registered_scraper_name() {
        let mut registry = ScraperRegistry::new();
        registry.register(Arc::new(StubScraper {
            scraper_name: "stub",
            results: vec![],
            error: None,
            delay: Duration::ZERO,
        }));
        assert!(registry.get("stub").is_some());
    }

    #[test]
    fn scrape_metrics_default_to_zero() {
        assert_eq!(ScrapeMetrics::default(), ScrapeMetrics { new: 0, updated: 0, blocked: 0, errored: 0 });
    }
}
