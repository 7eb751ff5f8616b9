//! Provider resolve endpoint (spec.md §6): hands back either a 302
//! redirect to a single-use provider URL (`Cache-Control: no-store`,
//! since the URL can't be reused) or an inline URL for schemes a
//! client can't follow as a redirect (magnet links).
//!
//! Per §7, a provider-level failure never surfaces as an HTTP error —
//! the request always succeeds from the client's perspective and is
//! redirected to a static error asset it can play instead (S4: an
//! expired token resolves to `{host}/static/exceptions/token_expired
//! .mp4`, not a 401).

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use mediafusion_core::error::ProviderError;
use mediafusion_core::models::InfoHash;

use crate::http::error::{AppError, AppResult};
use crate::http::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InlineUrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorUrlResponse {
    pub error_url: String,
    pub reason: String,
}

pub async fn resolve(
    State(state): State<AppState>,
    axum::extract::Path((service, info_hash)): axum::extract::Path<(String, String)>,
    Query(query): Query<ResolveQuery>,
) -> AppResult<Response> {
    let hash = InfoHash::parse(&info_hash).map_err(|e| AppError::bad_request(e.to_string()))?;

    let resolution = state
        .resolution_services
        .get(&service)
        .ok_or_else(|| AppError::not_found(format!("unknown provider: {service}")))?;

    let url = match resolution.resolve(&hash, &hash.magnet_base(), query.filename.as_deref()).await {
        Ok(url) => url,
        Err(err @ (ProviderError::Auth | ProviderError::Quota | ProviderError::Content)) => {
            return Ok(error_redirect(&state, err));
        }
        Err(err) => return Err(err.into()),
    };

    if url.starts_with("http://") || url.starts_with("https://") {
        Ok((
            StatusCode::FOUND,
            [(header::LOCATION, url), (header::CACHE_CONTROL, "no-store".to_string())],
        )
            .into_response())
    } else {
        Ok(Json(InlineUrlResponse { url }).into_response())
    }
}

/// Maps a provider failure to its static error-asset redirect instead
/// of an HTTP error status (§7, §6 `{error_url, reason}`).
fn error_redirect(state: &AppState, err: ProviderError) -> Response {
    let (asset, reason) = match err {
        ProviderError::Auth => ("token_expired.mp4", "provider authentication failed"),
        ProviderError::Quota => ("exceeded_quota.mp4", "provider quota exceeded"),
        ProviderError::Content => ("no_matching_file.mp4", "no matching file in provider cache"),
        _ => unreachable!("only Auth/Quota/Content route through error_redirect"),
    };

    let error_url = state.config.error_asset_url(asset);
    tracing::info!(%error_url, reason, "provider error, redirecting to error asset");

    (
        StatusCode::FOUND,
        [(header::LOCATION, error_url.clone()), (header::CACHE_CONTROL, "no-store".to_string())],
        Json(ErrorUrlResponse { error_url, reason: reason.to_string() }),
    )
        .into_response()
}
