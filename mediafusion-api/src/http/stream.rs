//! The addon protocol's stream endpoint (spec.md §6 "Stream protocol
//! JSON"): `GET /stream/{type}/{id}.json`, optionally prefixed with a
//! base64-encoded `UserPreferenceVector` the way Stremio addons carry
//! per-install configuration in the URL path itself.

use axum::extract::{Path, State};
use axum::response::Json;
use base64::Engine;
use serde::{Deserialize, Serialize};

use mediafusion_core::models::{ExternalId, Media, MediaKind, Stream, StreamPayload, UserPreferenceVector};
use mediafusion_core::{filter, scraper::run_scrapers};

use crate::http::error::{AppError, AppResult};
use crate::http::AppState;

#[derive(Debug, Serialize)]
pub struct StreamResponse {
    pub streams: Vec<StreamEntry>,
}

#[derive(Debug, Serialize)]
pub struct StreamEntry {
    pub name: String,
    pub title: String,
    #[serde(rename = "infoHash", skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    #[serde(rename = "url", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "behaviorHints")]
    pub behavior_hints: BehaviorHints,
}

#[derive(Debug, Serialize)]
pub struct BehaviorHints {
    pub filename: String,
    #[serde(rename = "bingeGroup", skip_serializing_if = "Option::is_none")]
    pub binge_group: Option<String>,
}

pub async fn movie_stream(
    State(state): State<AppState>,
    Path(id_json): Path<String>,
) -> AppResult<Json<StreamResponse>> {
    stream_handler(state, MediaKind::Movie, &id_json, UserPreferenceVector::default()).await
}

pub async fn series_stream(
    State(state): State<AppState>,
    Path(id_json): Path<String>,
) -> AppResult<Json<StreamResponse>> {
    stream_handler(state, MediaKind::Series, &id_json, UserPreferenceVector::default()).await
}

pub async fn configured_movie_stream(
    State(state): State<AppState>,
    Path((config, id_json)): Path<(String, String)>,
) -> AppResult<Json<StreamResponse>> {
    let preferences = decode_preferences(&config)?;
    stream_handler(state, MediaKind::Movie, &id_json, preferences).await
}

pub async fn configured_series_stream(
    State(state): State<AppState>,
    Path((config, id_json)): Path<(String, String)>,
) -> AppResult<Json<StreamResponse>> {
    let preferences = decode_preferences(&config)?;
    stream_handler(state, MediaKind::Series, &id_json, preferences).await
}

fn decode_preferences(config: &str) -> AppResult<UserPreferenceVector> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(config)
        .map_err(|e| AppError::bad_request(format!("invalid config segment: {e}")))?;
    let preferences: UserPreferenceVector =
        serde_json::from_slice(&bytes).map_err(|e| AppError::bad_request(format!("invalid config payload: {e}")))?;
    let problems = preferences.validate();
    if !problems.is_empty() {
        return Err(AppError::bad_request(problems.join("; ")));
    }
    Ok(preferences)
}

async fn stream_handler(
    state: AppState,
    kind: MediaKind,
    id_json: &str,
    preferences: UserPreferenceVector,
) -> AppResult<Json<StreamResponse>> {
    let (external_id, season, episode) = parse_stream_id(id_json)?;

    let fallback = Media::new(external_id.clone(), kind, external_id.as_str().to_string(), None);
    let enriched = state.enricher.enrich(&external_id, kind, &fallback.title, fallback.year).await;
    let media = state.media_store.find_or_create(enriched).await?;

    let candidates = run_scrapers(&media, kind, season, episode, &state.scrapers, state.orchestrator_config).await;

    for stream in candidates {
        let (_, _outcome) = state.stream_store.upsert(stream, media.id).await?;
    }

    let streams = state.stream_store.streams_for(media.id, kind, season, episode).await?;
    let (survivors, histogram) = filter::filter_and_sort(streams, &preferences, id_json);

    if !histogram.is_empty() {
        tracing::debug!(?histogram, id = id_json, "streams dropped by filter/sort pipeline");
    }

    let entries = survivors.into_iter().map(|s| to_stream_entry(s, kind)).collect();
    Ok(Json(StreamResponse { streams: entries }))
}

/// `tt1234567` or `tt1234567:1:2` (season/episode only meaningful for
/// series ids).
fn parse_stream_id(raw: &str) -> AppResult<(ExternalId, Option<u32>, Option<u32>)> {
    let trimmed = raw.strip_suffix(".json").unwrap_or(raw);
    let mut parts = trimmed.split(':');
    let external_id = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| AppError::bad_request("missing id"))?;
    let season = parts.next().and_then(|s| s.parse().ok());
    let episode = parts.next().and_then(|s| s.parse().ok());
    Ok((ExternalId(external_id.to_string()), season, episode))
}

fn to_stream_entry(stream: Stream, kind: MediaKind) -> StreamEntry {
    let size_label = human_size(stream.size_bytes);
    let quality_label = stream.resolution.clone().unwrap_or_else(|| "unknown".to_string());

    let mut title_lines = vec![stream.display_name.clone()];
    title_lines.push(format!("💾 {size_label}  👤 {}", stream.seeders.map_or_else(|| "?".to_string(), |s| s.to_string())));
    if !stream.trackers.is_empty() {
        title_lines.push(format!("⚙️ {}", stream.trackers.join(", ")));
    }

    let info_hash = Some(stream.info_hash.as_str().to_string());
    let url = match &stream.payload {
        StreamPayload::DirectUrl { url } | StreamPayload::LiveM3u8 { url } => Some(url.clone()),
        _ => None,
    };

    StreamEntry {
        name: "MediaFusion".to_string(),
        title: title_lines.join("\n"),
        info_hash: if url.is_some() { None } else { info_hash },
        url,
        behavior_hints: BehaviorHints {
            filename: stream.display_name,
            binge_group: Some(format!("mediafusion-{}-{quality_label}", kind.as_str())),
        },
    }
}

/// Human-readable size for the title line; the inverse of
/// [`mediafusion_core::parser::parse_size_string`].
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_movie_id_with_no_season_episode() {
        let (id, season, episode) = parse_stream_id("tt0133093.json").unwrap();
        assert_eq!(id.as_str(), "tt0133093");
        assert_eq!(season, None);
        assert_eq!(episode, None);
    }

    #[test]
    fn parses_series_id_with_season_and_episode() {
        let (id, season, episode) = parse_stream_id("tt0903747:5:14.json").unwrap();
        assert_eq!(id.as_str(), "tt0903747");
        assert_eq!(season, Some(5));
        assert_eq!(episode, Some(14));
    }

    #[test]
    fn human_size_formats_gigabytes() {
        assert_eq!(human_size(1_610_612_736), "1.50 GB");
    }

    #[test]
    fn human_size_formats_bytes_below_one_kb() {
        assert_eq!(human_size(512), "512 B");
    }
}
