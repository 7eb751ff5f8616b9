//! Availability endpoint (spec.md §6): `POST /cache/status` and
//! `POST /cache/submit` against a named debrid provider.

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use mediafusion_core::models::InfoHash;

use crate::http::error::{AppError, AppResult};
use crate::http::AppState;

#[derive(Debug, Deserialize)]
pub struct CacheStatusRequest {
    pub service: String,
    pub info_hashes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CacheStatusResponse {
    pub cached_status: HashMap<String, bool>,
}

pub async fn cache_status(
    State(state): State<AppState>,
    Json(request): Json<CacheStatusRequest>,
) -> AppResult<Json<CacheStatusResponse>> {
    let resolution = state
        .resolution_services
        .get(&request.service)
        .ok_or_else(|| AppError::not_found(format!("unknown provider: {}", request.service)))?;

    let mut cached_status = HashMap::with_capacity(request.info_hashes.len());
    for raw in &request.info_hashes {
        let hash = InfoHash::parse(raw).map_err(|e| AppError::bad_request(e.to_string()))?;
        let is_cached = resolution.is_cached(&hash).await?;
        cached_status.insert(raw.clone(), is_cached);
    }

    Ok(Json(CacheStatusResponse { cached_status }))
}

#[derive(Debug, Deserialize)]
pub struct CacheSubmitRequest {
    pub service: String,
    pub info_hashes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CacheSubmitResponse {
    pub success: bool,
    pub message: String,
}

/// Fire-and-forget: ask the provider to start downloading every hash so
/// a later `/stream` request finds it already cached. Partial failures
/// don't fail the whole call — the response message lists which hashes
/// didn't submit.
pub async fn cache_submit(
    State(state): State<AppState>,
    Json(request): Json<CacheSubmitRequest>,
) -> AppResult<Json<CacheSubmitResponse>> {
    let provider = state
        .provider_registry
        .get(&request.service)
        .ok_or_else(|| AppError::not_found(format!("unknown provider: {}", request.service)))?;

    let mut failed = Vec::new();
    for raw in &request.info_hashes {
        let Ok(hash) = InfoHash::parse(raw) else {
            failed.push(raw.clone());
            continue;
        };
        if let Err(err) = provider.submit(&hash, &hash.magnet_base()).await {
            tracing::warn!(provider = request.service, info_hash = %hash, %err, "submit failed");
            failed.push(raw.clone());
        }
    }

    let message = if failed.is_empty() {
        format!("submitted {} hash(es) to {}", request.info_hashes.len(), request.service)
    } else {
        format!("failed to submit: {}", failed.join(", "))
    };

    Ok(Json(CacheSubmitResponse { success: failed.is_empty(), message }))
}
