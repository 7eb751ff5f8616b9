//! Centralized cache key construction (§6: "all keys prefixed by
//! component: `avail:`, `scraper:`, `meta:`, `setup_code:`, `manifest:`,
//! `events:`").

use crate::config::Config;

pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.redis.key_prefix.clone())
    }

    /// `avail:{provider}:{hash}` (§4.5).
    #[must_use]
    pub fn availability(&self, provider: &str, info_hash: &str) -> String {
        format!("{}avail:{provider}:{info_hash}", self.prefix)
    }

    /// `{scraper.name}:{kind}:{media_id}:{season?}:{episode?}` (§4.2 cache
    /// decorator key), itself namespaced under `scraper:`.
    #[must_use]
    pub fn scrape_result(
        &self,
        scraper: &str,
        kind: &str,
        media_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> String {
        format!(
            "{}scraper:{scraper}:{kind}:{media_id}:{}:{}",
            self.prefix,
            season.map_or_else(String::new, |s| s.to_string()),
            episode.map_or_else(String::new, |e| e.to_string()),
        )
    }

    /// Metadata Enricher's own cache (§6 `meta:`).
    #[must_use]
    pub fn metadata(&self, provider: &str, external_id: &str) -> String {
        format!("{}meta:{provider}:{external_id}", self.prefix)
    }

    /// Short-lived Kodi pairing codes (§6 `setup_code:`).
    #[must_use]
    pub fn setup_code(&self, code: &str) -> String {
        format!("{}setup_code:{code}", self.prefix)
    }

    /// Cached addon manifest payload (§6 `manifest:`).
    #[must_use]
    pub fn manifest(&self, user_scope: &str) -> String {
        format!("{}manifest:{user_scope}", self.prefix)
    }

    /// Time-indexed recent-events sorted set (§4.7 `zadd/zrangebyscore`).
    #[must_use]
    pub fn events(&self, stream: &str) -> String {
        format!("{}events:{stream}", self.prefix)
    }

    /// Per-source rate-limiter bucket state, when backed by shared cache
    /// rather than an in-process `governor` limiter.
    #[must_use]
    pub fn rate_limit(&self, scraper: &str) -> String {
        format!("{}ratelimit:{scraper}", self.prefix)
    }

    #[must_use]
    pub fn scheduler_leader(&self) -> String {
        format!("{}scheduler:leader", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_key_matches_spec_shape() {
        let kb = KeyBuilder::new("mediafusion:");
        assert_eq!(kb.availability("realdebrid", &"a".repeat(40)), format!("mediafusion:avail:realdebrid:{}", "a".repeat(40)));
    }

    #[test]
    fn scrape_result_key_includes_optional_season_episode() {
        let kb = KeyBuilder::new("mediafusion:");
        assert_eq!(
            kb.scrape_result("torrentio", "series", "tt123", Some(1), Some(2)),
            "mediafusion:scraper:torrentio:series:tt123:1:2"
        );
        assert_eq!(
            kb.scrape_result("torrentio", "movie", "tt123", None, None),
            "mediafusion:scraper:torrentio:movie:tt123::"
        );
    }

    #[test]
    fn scheduler_leader_key_is_stable() {
        let kb = KeyBuilder::new("mediafusion:");
        assert_eq!(kb.scheduler_leader(), "mediafusion:scheduler:leader");
    }
}
