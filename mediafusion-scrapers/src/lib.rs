// Concrete scraper plugins
//
// Each submodule implements `mediafusion_core::scraper::Scraper` against
// one family of upstream source: a Stremio-addon JSON protocol, a
// hash-list/DMM search API, an HTML forum indexer, and an RSS feed.
// These are pure HTTP clients wired to the `Scraper` contract; the
// decorator chain (cache, rate limit, circuit breaker) lives in
// `mediafusion-core` and wraps whichever of these a deployment enables.

pub mod dmm;
pub mod html_indexer;
pub mod rss_feed;
pub mod stremio_addon;

pub use dmm::DmmScraper;
pub use html_indexer::HtmlIndexerScraper;
pub use rss_feed::RssFeedScraper;
pub use stremio_addon::StremioAddonScraper;
