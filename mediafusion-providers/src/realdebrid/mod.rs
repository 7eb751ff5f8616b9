//! RealDebrid client: OAuth device-code auth (§4.5 `DeviceCode`), the
//! canonical three-step submit (`addMagnet` -> `selectFiles` ->
//! `unrestrict/link`), and instant-availability batch checks.
//! Grounded on the shared-client-pool HTTP pattern and on RealDebrid's
//! own public REST API.

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

const API_BASE: &str = "https://api.real-debrid.com/rest/1.0";

static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .build()
        .expect("failed to build RealDebrid shared HTTP client")
});

pub struct RealDebridProvider {
    token: String,
    client_id: String,
    client: Client,
    /// `submit` hands back an opaque torrent id that `resolve` needs
    /// but the `DebridProvider` contract only threads the info-hash
    /// through, so the mapping lives here for the lifetime of this
    /// instance.
    job_ids: DashMap<String, String>,
}

impl RealDebridProvider {
    #[must_use]
    pub fn new(token: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self { token: token.into(), client_id: client_id.into(), client: SHARED_CLIENT.clone(), job_ids: DashMap::new() }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn map_status(status: reqwest::StatusCode) -> ProviderError {
        match status.as_u16() {
            401 | 403 => ProviderError::Auth,
            429 => ProviderError::Quota,
            404 | 503 => ProviderError::Content,
            _ => ProviderError::Protocol(format!("unexpected status {status}")),
        }
    }
}

#[async_trait]
impl DebridProvider for RealDebridProvider {
    fn name(&self) -> &str {
        "realdebrid"
    }

    fn auth_strategy(&self) -> AuthStrategy {
        AuthStrategy::DeviceCode { client_id: self.client_id.clone() }
    }

    async fn check(&self, info_hashes: &[InfoHash]) -> Result<HashMap<InfoHash, bool>, ProviderError> {
        if info_hashes.is_empty() {
            return Ok(HashMap::new());
        }
        let hash_path = info_hashes.iter().map(InfoHash::as_str).collect::<Vec<_>>().join("/");
        let url = format!("{API_BASE}/torrents/instantAvailability/{hash_path}");

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }

        let body: HashMap<String, InstantAvailabilityEntry> =
            response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;

        Ok(info_hashes
            .iter()
            .map(|hash| {
                let cached = body.get(hash.as_str()).is_some_and(InstantAvailabilityEntry::has_variant);
                (hash.clone(), cached)
            })
            .collect())
    }

    async fn submit(&self, info_hash: &InfoHash, magnet: &str) -> Result<String, ProviderError> {
        let add_response = self
            .client
            .post(format!("{API_BASE}/torrents/addMagnet"))
            .header("Authorization", self.auth_header())
            .form(&[("magnet", magnet)])
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !add_response.status().is_success() {
            return Err(Self::map_status(add_response.status()));
        }

        let added: AddMagnetResponse =
            add_response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;

        let select_response = self
            .client
            .post(format!("{API_BASE}/torrents/selectFiles/{}", added.id))
            .header("Authorization", self.auth_header())
            .form(&[("files", "all")])
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !select_response.status().is_success() && select_response.status().as_u16() != 204 {
            return Err(Self::map_status(select_response.status()));
        }

        self.job_ids.insert(info_hash.as_str().to_string(), added.id.clone());
        Ok(added.id)
    }

    async fn resolve(&self, info_hash: &InfoHash, _file_hint: Option<&str>) -> Result<String, ProviderError> {
        let job_id = self
            .job_ids
            .get(info_hash.as_str())
            .map(|entry| entry.clone())
            .ok_or_else(|| ProviderError::Protocol("resolve called before submit".to_string()))?;

        let info_response = self
            .client
            .get(format!("{API_BASE}/torrents/info/{job_id}"))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !info_response.status().is_success() {
            return Err(Self::map_status(info_response.status()));
        }

        let info: TorrentInfoResponse =
            info_response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;
        let link = info.links.first().ok_or(ProviderError::Content)?;

        let unrestrict_response = self
            .client
            .post(format!("{API_BASE}/unrestrict/link"))
            .header("Authorization", self.auth_header())
            .form(&[("link", link.as_str())])
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !unrestrict_response.status().is_success() {
            return Err(Self::map_status(unrestrict_response.status()));
        }

        let unrestricted: UnrestrictResponse =
            unrestrict_response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;
        Ok(unrestricted.download)
    }

    async fn list_active(&self) -> Result<Vec<ActiveJob>, ProviderError> {
        let response = self
            .client
            .get(format!("{API_BASE}/torrents?filter=active"))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }

        let torrents: Vec<TorrentListEntry> =
            response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;

        Ok(torrents
            .into_iter()
            .filter_map(|t| {
                let info_hash = InfoHash::parse(&t.hash).ok()?;
                Some(ActiveJob { info_hash, status: t.status, progress: t.progress })
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct InstantAvailabilityEntry {
    #[serde(flatten)]
    variants: HashMap<String, serde_json::Value>,
}

impl InstantAvailabilityEntry {
    fn has_variant(&self) -> bool {
        self.variants.values().any(|v| v.as_array().is_some_and(|a| !a.is_empty()))
    }
}

#[derive(Debug, Deserialize)]
struct AddMagnetResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TorrentInfoResponse {
    #[serde(default)]
    links: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UnrestrictResponse {
    download: String,
}

#[derive(Debug, Deserialize)]
struct TorrentListEntry {
    hash: String,
    status: String,
    #[serde(default)]
    progress: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn auth_strategy_is_device_code_with_configured_client_id() {
        let provider = RealDebridProvider::new("tok", "client-123");
        assert!(matches!(provider.auth_strategy(), AuthStrategy::DeviceCode { client_id } if client_id == "client-123"));
    }

    #[test]
    fn maps_401_to_auth_error() {
        assert!(matches!(RealDebridProvider::map_status(reqwest::StatusCode::UNAUTHORIZED), ProviderError::Auth));
    }

    #[test]
    fn maps_429_to_quota_error() {
        assert!(matches!(RealDebridProvider::map_status(reqwest::StatusCode::TOO_MANY_REQUESTS), ProviderError::Quota));
    }

    #[tokio::test]
    async fn resolve_without_prior_submit_is_a_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
        let provider = RealDebridProvider::new("tok", "client-123");
        let hash = InfoHash::parse(&"a".repeat(40)).unwrap();
        let result = provider.resolve(&hash, None).await;
        assert!(matches!(result, Err(ProviderError::Protocol(_))));
    }
}
