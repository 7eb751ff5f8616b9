//! Local/self-hosted provider: a qBittorrent Web API backend with the
//! finished download served back over WebDAV (§4.5 `WebDavOrP2P`).
//! There's no cloud cache to query, so `check` always reports a miss
//! and the resolution state machine always runs a full download before
//! a URL can be handed back.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use mediafusion_core::error::ProviderError;
use mediafusion_core::models::InfoHash;
use mediafusion_core::provider::{ActiveJob, AuthStrategy, DebridProvider};

static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .cookie_store(true)
        .build()
        .expect("failed to build local WebDAV/qBittorrent shared HTTP client")
});

pub struct WebDavProvider {
    qbittorrent_url: String,
    webdav_url: String,
    username: String,
    password: String,
    client: Client,
}

impl WebDavProvider {
    #[must_use]
    pub fn new(
        qbittorrent_url: impl Into<String>,
        webdav_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            qbittorrent_url: qbittorrent_url.into(),
            webdav_url: webdav_url.into(),
            username: username.into(),
            password: password.into(),
            client: SHARED_CLIENT.clone(),
        }
    }

    async fn login(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(format!("{}/api/v2/auth/login", self.qbittorrent_url))
            .form(&[("username", self.username.as_str()), ("password", self.password.as_str())])
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Auth);
        }
        Ok(())
    }

    fn map_status(status: reqwest::StatusCode) -> ProviderError {
        match status.as_u16() {
            401 | 403 => ProviderError::Auth,
            404 => ProviderError::Content,
            _ => ProviderError::Protocol(format!("unexpected status {status}")),
        }
    }
}

#[async_trait]
impl DebridProvider for WebDavProvider {
    fn name(&self) -> &str {
        "webdav"
    }

    fn auth_strategy(&self) -> AuthStrategy {
        AuthStrategy::WebDavOrP2P
    }

    /// No cloud-cache concept exists locally; every hash is treated as
    /// not yet downloaded.
    async fn check(&self, info_hashes: &[InfoHash]) -> Result<HashMap<InfoHash, bool>, ProviderError> {
        Ok(info_hashes.iter().map(|hash| (hash.clone(), false)).collect())
    }

    async fn submit(&self, info_hash: &InfoHash, magnet: &str) -> Result<String, ProviderError> {
        self.login().await?;

        let response = self
            .client
            .post(format!("{}/api/v2/torrents/add", self.qbittorrent_url))
            .form(&[("urls", magnet)])
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }

        Ok(info_hash.as_str().to_string())
    }

    async fn resolve(&self, info_hash: &InfoHash, file_hint: Option<&str>) -> Result<String, ProviderError> {
        self.login().await?;

        let response = self
            .client
            .get(format!("{}/api/v2/torrents/info", self.qbittorrent_url))
            .query(&[("hashes", info_hash.as_str())])
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }

        let torrents: Vec<TorrentInfo> = response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;
        let torrent = torrents.first().ok_or(ProviderError::Content)?;

        if torrent.progress < 1.0 {
            return Err(ProviderError::Protocol(format!("download not complete: {:.0}%", torrent.progress * 100.0)));
        }

        let relative_path = file_hint.unwrap_or(&torrent.name);
        Ok(format!("{}/{}", self.webdav_url.trim_end_matches('/'), relative_path.trim_start_matches('/')))
    }

    async fn list_active(&self) -> Result<Vec<ActiveJob>, ProviderError> {
        self.login().await?;

        let response = self
            .client
            .get(format!("{}/api/v2/torrents/info", self.qbittorrent_url))
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }

        let torrents: Vec<TorrentInfo> = response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;

        Ok(torrents
            .into_iter()
            .filter_map(|t| {
                let info_hash = InfoHash::parse(&t.hash).ok()?;
                Some(ActiveJob { info_hash, status: t.state, progress: t.progress })
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct TorrentInfo {
    hash: String,
    name: String,
    state: String,
    progress: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_strategy_is_webdav_or_p2p() {
        let provider = WebDavProvider::new("http://localhost:8080", "http://localhost:8081", "admin", "adminadmin");
        assert!(matches!(provider.auth_strategy(), AuthStrategy::WebDavOrP2P));
    }

    #[tokio::test]
    async fn check_always_reports_uncached_since_there_is_no_cloud_cache() {
        let provider = WebDavProvider::new("http://localhost:8080", "http://localhost:8081", "admin", "adminadmin");
        let hash = InfoHash::parse(&"a".repeat(40)).unwrap();
        let result = provider.check(&[hash.clone()]).await.unwrap();
        assert_eq!(result.get(&hash), Some(&false));
    }
}
