// Module: http
// Stremio-addon-protocol HTTP surface: stream lookup, debrid
// availability/cache endpoints, and the provider resolve redirect.

pub mod cache;
pub mod error;
pub mod health;
pub mod resolve;
pub mod stream;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use mediafusion_core::enrich::MetadataEnricher;
use mediafusion_core::provider::{ProviderRegistry, ResolutionService};
use mediafusion_core::scraper::{OrchestratorConfig, Scraper};
use mediafusion_core::store::{MediaStore, StreamStore};
use mediafusion_core::Config;

pub use error::{AppError, AppResult};

/// Everything a handler needs to serve a request, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub redis_conn: redis::aio::ConnectionManager,
    pub media_store: Arc<MediaStore>,
    pub stream_store: Arc<StreamStore>,
    pub scrapers: Arc<Vec<Arc<dyn Scraper>>>,
    pub orchestrator_config: OrchestratorConfig,
    pub enricher: Arc<MetadataEnricher>,
    pub provider_registry: Arc<ProviderRegistry>,
    pub resolution_services: Arc<HashMap<String, Arc<ResolutionService>>>,
}

/// Assemble the full router: the addon protocol's stream routes (both
/// bare and config-prefixed, per Stremio's per-install config-in-path
/// convention), the availability endpoints, the provider resolve
/// redirect, and health checks.
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .merge(health::create_health_router())
        .route("/stream/movie/{id}", get(stream::movie_stream))
        .route("/stream/series/{id}", get(stream::series_stream))
        .route("/{config}/stream/movie/{id}", get(stream::configured_movie_stream))
        .route("/{config}/stream/series/{id}", get(stream::configured_series_stream))
        .route("/cache/status", post(cache::cache_status))
        .route("/cache/submit", post(cache::cache_submit))
        .route("/resolve/{service}/{info_hash}", get(resolve::resolve))
        .with_state(state.clone());

    apply_global_layers(router, &state)
}

/// Stremio addon manifests are fetched cross-origin from the Stremio
/// client itself, so the addon surface stays open to any origin rather
/// than gated by an allowlist.
fn build_cors_layer() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
}

fn apply_global_layers(router: Router, _state: &AppState) -> Router {
    router
        .layer(build_cors_layer())
        .layer(axum::extract::DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
}
