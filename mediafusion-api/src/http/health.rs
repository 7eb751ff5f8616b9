//! Health check endpoints
//!
//! # Endpoints
//!
//! - `/health/live` - Liveness probe: checks if the application is running (basic check)
//! - `/health/ready` - Readiness probe: checks if dependencies (DB, Redis) are healthy
//! - `/health` - Alias for `/health/live` for backward compatibility

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::http::AppState;

/// Health check router
pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(liveness_check))
        .route("/health/live", get(liveness_check))
        .route("/health/ready", get(readiness_check))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthDetails {
    pub database: String,
    pub redis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Liveness probe - always OK if the process is responding.
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok".to_string(), details: None }))
}

/// Readiness probe - pings the Postgres pool and the Redis connection
/// manager directly, since this crate has no per-service health_check
/// wrapper to delegate to.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let mut error_messages = Vec::new();

    let db_status = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "healthy".to_string(),
        Err(e) => {
            error!("database health check failed: {e}");
            error_messages.push(format!("Database: {e}"));
            "unhealthy".to_string()
        }
    };

    let redis_status = match redis::cmd("PING").query_async::<String>(&mut state.redis_conn.clone()).await {
        Ok(_) => "healthy".to_string(),
        Err(e) => {
            error!("redis health check failed: {e}");
            error_messages.push(format!("Redis: {e}"));
            "unhealthy".to_string()
        }
    };

    let is_healthy = error_messages.is_empty();
    let status_code = if is_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    let response = HealthResponse {
        status: if is_healthy { "healthy".to_string() } else { "unhealthy".to_string() },
        details: Some(HealthDetails {
            database: db_status,
            redis: redis_status,
            message: if error_messages.is_empty() { None } else { Some(error_messages.join("; ")) },
        }),
    };

    (status_code, Json(response))
}
