//! TorBox client: static API token auth (§4.5 `TokenOnly`), a single
//! cached-hash-list check endpoint, and a create/poll/request-download
//! submit path. Grounded on TorBox's public REST API and the same
//! shared-client pool pattern as [`crate::realdebrid`].

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde::Deserialize;

use mediafusion_core::error::ProviderError;
use mediafusion_core::models::InfoHash;
use mediafusion_core::provider::{ActiveJob, AuthStrategy, DebridProvider};

const API_BASE: &str = "https://api.torbox.app/v1/api";

static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .build()
        .expect("failed to build TorBox shared HTTP client")
});

pub struct TorBoxProvider {
    token: String,
    client: Client,
    job_ids: DashMap<String, u64>,
}

impl TorBoxProvider {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into(), client: SHARED_CLIENT.clone(), job_ids: DashMap::new() }
    }

    fn map_status(status: reqwest::StatusCode) -> ProviderError {
        match status.as_u16() {
            401 | 403 => ProviderError::Auth,
            429 => ProviderError::Quota,
            404 => ProviderError::Content,
            _ => ProviderError::Protocol(format!("unexpected status {status}")),
        }
    }
}

#[async_trait]
impl DebridProvider for TorBoxProvider {
    fn name(&self) -> &str {
        "torbox"
    }

    fn auth_strategy(&self) -> AuthStrategy {
        AuthStrategy::TokenOnly
    }

    async fn check(&self, info_hashes: &[InfoHash]) -> Result<HashMap<InfoHash, bool>, ProviderError> {
        if info_hashes.is_empty() {
            return Ok(HashMap::new());
        }
        let hashes_param = info_hashes.iter().map(InfoHash::as_str).collect::<Vec<_>>().join(",");

        let response = self
            .client
            .get(format!("{API_BASE}/torrents/checkcached"))
            .bearer_auth(&self.token)
            .query(&[("hash", hashes_param.as_str()), ("format", "list")])
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }

        let body: CheckCachedResponse =
            response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;
        let cached: std::collections::HashSet<String> = body.data.into_iter().map(|e| e.hash.to_lowercase()).collect();

        Ok(info_hashes.iter().map(|hash| (hash.clone(), cached.contains(hash.as_str()))).collect())
    }

    async fn submit(&self, info_hash: &InfoHash, magnet: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{API_BASE}/torrents/createtorrent"))
            .bearer_auth(&self.token)
            .form(&[("magnet", magnet), ("seed", "1")])
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }

        let body: CreateTorrentResponse =
            response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;

        self.job_ids.insert(info_hash.as_str().to_string(), body.data.torrent_id);
        Ok(body.data.torrent_id.to_string())
    }

    async fn resolve(&self, info_hash: &InfoHash, file_hint: Option<&str>) -> Result<String, ProviderError> {
        let torrent_id = self
            .job_ids
            .get(info_hash.as_str())
            .map(|entry| *entry)
            .ok_or_else(|| ProviderError::Protocol("resolve called before submit".to_string()))?;

        let mut query = vec![("token", self.token.clone()), ("torrent_id", torrent_id.to_string())];
        if let Some(hint) = file_hint {
            query.push(("file_id", hint.to_string()));
        }

        let response = self
            .client
            .get(format!("{API_BASE}/torrents/requestdl"))
            .query(&query)
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }

        let body: RequestDlResponse =
            response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;
        Ok(body.data)
    }

    async fn list_active(&self) -> Result<Vec<ActiveJob>, ProviderError> {
        let response = self
            .client
            .get(format!("{API_BASE}/torrents/mylist"))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }

        let body: MyListResponse = response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;

        Ok(body
            .data
            .into_iter()
            .filter_map(|t| {
                let info_hash = InfoHash::parse(&t.hash).ok()?;
                Some(ActiveJob { info_hash, status: t.download_state, progress: t.progress })
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct CheckCachedResponse {
    #[serde(default)]
    data: Vec<CheckCachedEntry>,
}

#[derive(Debug, Deserialize)]
struct CheckCachedEntry {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct CreateTorrentResponse {
    data: CreateTorrentData,
}

#[derive(Debug, Deserialize)]
struct CreateTorrentData {
    torrent_id: u64,
}

#[derive(Debug, Deserialize)]
struct RequestDlResponse {
    data: String,
}

#[derive(Debug, Deserialize)]
struct MyListResponse {
    #[serde(default)]
    data: Vec<MyListEntry>,
}

#[derive(Debug, Deserialize)]
struct MyListEntry {
    hash: String,
    download_state: String,
    #[serde(default)]
    progress: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_strategy_is_token_only() {
        assert!(matches!(TorBoxProvider::new("tok").auth_strategy(), AuthStrategy::TokenOnly));
    }

    #[test]
    fn maps_403_to_auth_error() {
        assert!(matches!(TorBoxProvider::map_status(reqwest::StatusCode::FORBIDDEN), ProviderError::Auth));
    }

    #[tokio::test]
    async fn resolve_without_prior_submit_is_a_protocol_error() {
        let provider = TorBoxProvider::new("tok");
        let hash = InfoHash::parse(&"a".repeat(40)).unwrap();
        let result = provider.resolve(&hash, None).await;
        assert!(matches!(result, Err(ProviderError::Protocol(_))));
    }
}
