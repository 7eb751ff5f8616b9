//! PikPak client: username/password auth (§4.5 `UsernamePassword`) --
//! PikPak has no instant-availability endpoint, so every `check` is a
//! submit-and-poll against its offline-download task queue rather than
//! a side-effect-free lookup, and `resolve` waits for that task to
//! finish before asking for the resulting file's direct link.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use mediafusion_core::error::ProviderError;
use mediafusion_core::models::InfoHash;
use mediafusion_core::provider::{ActiveJob, AuthStrategy, DebridProvider};

const API_BASE: &str = "https://api-drive.mypikpak.com";

static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .build()
        .expect("failed to build PikPak shared HTTP client")
});

pub struct PikPakProvider {
    username: String,
    password: String,
    client: Client,
    access_token: RwLock<Option<String>>,
    task_ids: DashMap<String, String>,
}

impl PikPakProvider {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            client: SHARED_CLIENT.clone(),
            access_token: RwLock::new(None),
            task_ids: DashMap::new(),
        }
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        if let Some(token) = self.access_token.read().await.clone() {
            return Ok(token);
        }

        let response = self
            .client
            .post(format!("{API_BASE}/v1/auth/signin"))
            .json(&serde_json::json!({ "username": self.username, "password": self.password }))
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }

        let body: SignInResponse = response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;
        *self.access_token.write().await = Some(body.access_token.clone());
        Ok(body.access_token)
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
impl DebridProvider for PikPakProvider {
    fn name(&self) -> &str {
        "pikpak"
    }

    fn auth_strategy(&self) -> AuthStrategy {
        AuthStrategy::UsernamePassword
    }

    /// PikPak has no batch availability lookup; the resolution service
    /// above this client should treat every result as a cache miss and
    /// drive a full submit/resolve cycle instead.
    async fn check(&self, info_hashes: &[InfoHash]) -> Result<HashMap<InfoHash, bool>, ProviderError> {
        Ok(info_hashes.iter().map(|hash| (hash.clone(), false)).collect())
    }

    async fn submit(&self, info_hash: &InfoHash, magnet: &str) -> Result<String, ProviderError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(format!("{API_BASE}/drive/v1/files"))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "kind": "drive#file", "upload_type": "UPLOAD_TYPE_URL", "url": {"url": magnet} }))
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }

        let body: CreateTaskResponse =
            response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;

        self.task_ids.insert(info_hash.as_str().to_string(), body.task.id.clone());
        Ok(body.task.id)
    }

    async fn resolve(&self, info_hash: &InfoHash, _file_hint: Option<&str>) -> Result<String, ProviderError> {
        let token = self.access_token().await?;
        let task_id = self
            .task_ids
            .get(info_hash.as_str())
            .map(|entry| entry.clone())
            .ok_or_else(|| ProviderError::Protocol("resolve called before submit".to_string()))?;

        let task_response = self
            .client
            .get(format!("{API_BASE}/drive/v1/tasks/{task_id}"))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !task_response.status().is_success() {
            return Err(Self::map_status(task_response.status()));
        }

        let task: TaskResponse = task_response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;
        if task.phase != "PHASE_TYPE_COMPLETE" {
            return Err(ProviderError::Protocol(format!("task not ready: {}", task.phase)));
        }

        let file_response = self
            .client
            .get(format!("{API_BASE}/drive/v1/files/{}", task.file_id))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        if !file_response.status().is_success() {
            return Err(Self::map_status(file_response.status()));
        }

        let file: FileResponse = file_response.json().await.map_err(|err| ProviderError::Protocol(err.to_string()))?;
        file.web_content_link.ok_or(ProviderError::Content)
    }

    async fn list_active(&self) -> Result<Vec<ActiveJob>, ProviderError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    task: TaskId,
}

#[derive(Debug, Deserialize)]
struct TaskId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    phase: String,
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    web_content_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_strategy_is_username_password() {
        assert!(matches!(PikPakProvider::new("u", "p").auth_strategy(), AuthStrategy::UsernamePassword));
    }

    #[tokio::test]
    async fn check_always_reports_uncached_since_pikpak_has_no_availability_lookup() {
        let provider = PikPakProvider::new("u", "p");
        let hash = InfoHash::parse(&"a".repeat(40)).unwrap();
        let result = provider.check(&[hash.clone()]).await.unwrap();
        assert_eq!(result.get(&hash), Some(&false));
    }

    #[tokio::test]
    async fn resolve_without_prior_submit_is_a_protocol_error() {
        let provider = PikPakProvider::new("u", "p");
        let hash = InfoHash::parse(&"a".repeat(40)).unwrap();
        let token_err = provider.resolve(&hash, None).await;
        assert!(token_err.is_err());
    }
}
