use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use mediafusion_core::cache::{AvailabilityCache, DistributedLock, KeyBuilder, KvCache, RedisKvCache};
use mediafusion_core::config::Config;
use mediafusion_core::enrich::MetadataEnricher;
use mediafusion_core::logging;
use mediafusion_core::provider::{DebridProvider, ProviderRegistry, ResolutionService};
use mediafusion_core::resilience::{circuit_breaker, rate_limit};
use mediafusion_core::scraper::{
    run_scheduled_scrape, CacheDecoratedScraper, OrchestratorConfig, ResilientScraper, Scraper, ScraperRegistry,
};
use mediafusion_core::store::{MediaStore, StreamStore};
use mediafusion_providers::{P2pProvider, PikPakProvider, RealDebridProvider, TorBoxProvider, WebDavProvider};
use mediafusion_scrapers::{DmmScraper, HtmlIndexerScraper, RssFeedScraper, StremioAddonScraper};

use mediafusion_api::http;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}");
        eprintln!("Using default configuration");
        Config::default()
    });

    logging::init_logging(&config.logging)?;

    info!("MediaFusion API server starting...");
    info!("HTTP address: {}", config.http_address());

    info!("Connecting to database: {}", config.database_url());
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_seconds))
        .connect(config.database_url())
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {e}");
            anyhow::anyhow!("Database connection failed: {e}")
        })?;
    info!("Database connected successfully");

    info!("Running database migrations...");
    sqlx::migrate!("../migrations").run(&pool).await.map_err(|e| {
        error!("Failed to run migrations: {e}");
        anyhow::anyhow!("Migration failed: {e}")
    })?;
    info!("Migrations completed");

    info!("Connecting to Redis: {}", config.redis_url());
    let redis_client = redis::Client::open(config.redis_url())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await.map_err(|e| {
        error!("Failed to connect to Redis: {e}");
        anyhow::anyhow!("Redis connection failed: {e}")
    })?;
    info!("Redis connected successfully");

    let kv: Arc<dyn KvCache> = Arc::new(RedisKvCache::new(redis_conn.clone()));
    let keys = KeyBuilder::from_config(&config);
    let media_store = Arc::new(MediaStore::new(pool.clone()));
    let stream_store = Arc::new(StreamStore::new(pool.clone()));
    let enricher = Arc::new(MetadataEnricher::new(Vec::new(), kv.clone(), keys.clone()));

    let scrapers = build_scrapers(&config, kv.clone());
    info!(count = scrapers.len(), "scrapers registered");

    let scraper_registry = build_scraper_registry(&scrapers);
    let scheduler_lock = DistributedLock::new(redis_conn.clone());
    tokio::spawn(run_scheduler_loop(
        scheduler_lock,
        scraper_registry,
        media_store.clone(),
        stream_store.clone(),
        config.cache.clone(),
    ));

    let (provider_registry, resolution_services) = build_providers(&config, kv.clone(), keys);
    info!(count = resolution_services.len(), "debrid providers registered");

    let state = http::AppState {
        config: Arc::new(config.clone()),
        pool,
        redis_conn,
        media_store,
        stream_store,
        scrapers: Arc::new(scrapers),
        orchestrator_config: OrchestratorConfig::default(),
        enricher,
        provider_registry: Arc::new(provider_registry),
        resolution_services: Arc::new(resolution_services),
    };

    let router = http::create_router(state);

    let http_address = config.http_address();
    info!("Starting HTTP server on {http_address}...");
    let addr: std::net::SocketAddr = http_address.parse().expect("invalid HTTP address");
    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind HTTP address");
    info!("HTTP server listening on {addr}");

    axum::serve(listener, router).await?;
    Ok(())
}

/// Wraps `scraper` resilience-first, cache-outermost, and type-erases it
/// for the registry (§4.2: "built once, at registry construction").
fn decorate<S: Scraper + 'static>(
    scraper: S,
    kv: Arc<dyn KvCache>,
    rate_per_second: u32,
    failure_threshold: u32,
    deadline: Duration,
) -> Arc<dyn Scraper> {
    let limiter = rate_limit::ScraperRateLimiter::create(rate_per_second.max(1));
    let breaker = circuit_breaker::ScraperCircuitBreaker::create(
        failure_threshold.max(1),
        Duration::from_secs(1),
        Duration::from_secs(30),
    );
    Arc::new(CacheDecoratedScraper::new(ResilientScraper::new(scraper, limiter, breaker, deadline), kv))
}

/// Base URLs come from environment overrides with a community-addon
/// default, since `ScraperConfig` only carries cross-cutting defaults
/// (timeouts, cache TTL, rate limit), not per-scraper endpoints.
fn build_scrapers(config: &Config, kv: Arc<dyn KvCache>) -> Vec<Arc<dyn Scraper>> {
    let ttl = Duration::from_secs(config.scraper.default_cache_ttl_seconds);
    let deadline = Duration::from_secs(config.scraper.default_timeout_seconds);
    let rate = config.scraper.default_rate_limit_per_second;
    let threshold = config.scraper.circuit_breaker_failure_threshold;
    let disabled = &config.scraper.disabled_scrapers;
    let enabled = |name: &str| !disabled.iter().any(|n| n == name);

    let mut scrapers = Vec::new();

    if enabled("torrentio") {
        let base = std::env::var("TORRENTIO_URL").unwrap_or_else(|_| "https://torrentio.strem.fun".to_string());
        scrapers.push(decorate(StremioAddonScraper::new("torrentio", base, ttl), kv.clone(), rate, threshold, deadline));
    }
    if enabled("zilean") {
        let base = std::env::var("ZILEAN_URL").unwrap_or_else(|_| "https://zilean.elfhosted.com".to_string());
        scrapers.push(decorate(DmmScraper::new("zilean", base, ttl), kv.clone(), rate, threshold, deadline));
    }
    if enabled("nyaa") {
        let base =
            std::env::var("NYAA_FEED_URL").unwrap_or_else(|_| "https://nyaa.si/?page=rss&q={query}".to_string());
        scrapers.push(decorate(RssFeedScraper::new("nyaa", base, ttl), kv.clone(), rate, threshold, deadline));
    }
    if enabled("1337x") {
        let base = std::env::var("X1337_URL").unwrap_or_else(|_| "https://1337x.to".to_string());
        scrapers.push(decorate(HtmlIndexerScraper::new("1337x", base, ttl), kv, rate, threshold, deadline));
    }

    scrapers
}

/// Concrete providers are enabled by presence of their credential
/// environment variables rather than a config toggle, since
/// `ProviderConfig` deliberately keeps per-provider auth out of the
/// shared config struct.
fn build_providers(
    config: &Config,
    kv: Arc<dyn KvCache>,
    keys: KeyBuilder,
) -> (ProviderRegistry, HashMap<String, Arc<ResolutionService>>) {
    let mut registry = ProviderRegistry::new();
    let mut resolution_services = HashMap::new();
    let timeout = Duration::from_secs(config.provider.default_timeout_seconds);
    let disabled = &config.provider.disabled_providers;

    let mut candidates: Vec<(&str, Arc<dyn DebridProvider>)> = Vec::new();

    if let Ok(token) = std::env::var("REALDEBRID_TOKEN") {
        let client_id = std::env::var("REALDEBRID_CLIENT_ID").unwrap_or_else(|_| "X245A4XAIBGVM".to_string());
        candidates.push(("realdebrid", Arc::new(RealDebridProvider::new(token, client_id))));
    }
    if let Ok(token) = std::env::var("TORBOX_TOKEN") {
        candidates.push(("torbox", Arc::new(TorBoxProvider::new(token))));
    }
    if let (Ok(user), Ok(pass)) = (std::env::var("PIKPAK_USERNAME"), std::env::var("PIKPAK_PASSWORD")) {
        candidates.push(("pikpak", Arc::new(PikPakProvider::new(user, pass))));
    }
    if let Ok(qbit_url) = std::env::var("QBITTORRENT_URL") {
        let webdav_url = std::env::var("WEBDAV_URL").unwrap_or_default();
        let user = std::env::var("QBITTORRENT_USERNAME").unwrap_or_default();
        let pass = std::env::var("QBITTORRENT_PASSWORD").unwrap_or_default();
        candidates.push(("webdav", Arc::new(WebDavProvider::new(qbit_url, webdav_url, user, pass))));
    }
    candidates.push(("p2p", Arc::new(P2pProvider::new())));

    for (name, provider) in candidates {
        if disabled.iter().any(|n| n == name) {
            continue;
        }
        registry.register(provider.clone());
        let availability = Arc::new(AvailabilityCache::new(kv.clone(), config.cache.availability_ttl_seconds, None));
        resolution_services
            .insert(name.to_string(), Arc::new(ResolutionService::new(provider, availability, keys.clone(), timeout)));
    }

    (registry, resolution_services)
}

fn build_scraper_registry(scrapers: &[Arc<dyn Scraper>]) -> ScraperRegistry {
    let mut registry = ScraperRegistry::new();
    for scraper in scrapers {
        registry.register(scraper.clone());
    }
    registry
}

/// Runs the scheduled ingest pass (§6 "from the scheduler") on a fixed
/// interval, only when this node holds the `scheduler:leader` lock, so
/// exactly one replica scrapes at a time when several are deployed.
async fn run_scheduler_loop(
    lock: DistributedLock,
    registry: ScraperRegistry,
    media_store: Arc<MediaStore>,
    stream_store: Arc<StreamStore>,
    cache_config: mediafusion_core::config::CacheConfig,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(cache_config.scheduler_lock_refresh_seconds));

    loop {
        ticker.tick().await;

        let Ok(Some(token)) = lock.acquire("scheduler:leader", cache_config.scheduler_lock_ttl_seconds).await else {
            continue;
        };

        for scraper in registry.enabled() {
            let name = scraper.name().to_string();
            match run_scheduled_scrape(&registry, &media_store, &stream_store, &name, false).await {
                Ok(metrics) => info!(scraper = %name, ?metrics, "scheduled scrape complete"),
                Err(err) => error!(scraper = %name, error = %err, "scheduled scrape failed"),
            }
        }

        if let Err(err) = lock.release("scheduler:leader", &token).await {
            error!(error = %err, "failed to release scheduler leader lock");
        }
    }
}
