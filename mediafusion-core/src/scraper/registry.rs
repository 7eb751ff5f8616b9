//! Registry of enabled scrapers (§4.3: "parallel fan-out across all
//! *enabled* scrapers").
//!
//! Simpler than a factory registry: scrapers are constructed once at
//! startup (each already wrapped in its resilience/cache decorators) and
//! just held here by name, since MediaFusion scrapers aren't
//! reconfigured at runtime the way `synctv`'s per-room media providers
//! are.

use std::collections::HashMap;
use std::sync::Arc;

use super::Scraper;

#[derive(Clone, Default)]
pub struct ScraperRegistry {
    scrapers: HashMap<String, Arc<dyn Scraper>>,
    disabled: std::collections::HashSet<String>,
}

impl ScraperRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scraper: Arc<dyn Scraper>) {
        self.scrapers.insert(scraper.name().to_string(), scraper);
    }

    pub fn disable(&mut self, name: &str) {
        self.disabled.insert(name.to_string());
    }

    #[must_use]
    pub fn enabled(&self) -> Vec<Arc<dyn Scraper>> {
        self.scrapers
            .iter()
            .filter(|(name, _)| !self.disabled.contains(*name))
            .map(|(_, scraper)| scraper.clone())
            .collect()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Scraper>> {
        self.scrapers.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::test_support::StubScraper;
    use std::time::Duration;

    #[test]
    fn disabled_scraper_is_excluded_from_enabled_list() {
        let mut registry = ScraperRegistry::new();
        registry.register(Arc::new(StubScraper {
            scraper_name: "a",
            results: vec![],
            error: None,
            delay: Duration::ZERO,
        }));
        registry.register(Arc::new(StubScraper {
            scraper_name: "b",
            results: vec![],
            error: None,
            delay: Duration::ZERO,
        }));
        registry.disable("b");

        let names: Vec<&str> = registry.enabled().iter().map(|s| s.name()).collect::<Vec<_>>().into_iter().collect();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0], "a");
    }
}
