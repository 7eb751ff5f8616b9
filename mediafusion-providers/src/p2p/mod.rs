//! P2P pass-through: no backend at all (§4.5, §9 "a provider's
//! `check/submit/resolve` does not vary by auth flow" — here there is
//! no auth flow either). `resolve` just hands the magnet link straight
//! back so a client capable of native P2P playback can use it directly.

use std::collections::HashMap;

use async_trait::async_trait;

use mediafusion_core::error::ProviderError;
use mediafusion_core::models::InfoHash;
use mediafusion_core::provider::{ActiveJob, AuthStrategy, DebridProvider};

#[derive(Default)]
pub struct P2pProvider;

impl P2pProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DebridProvider for P2pProvider {
    fn name(&self) -> &str {
        "p2p"
    }

    fn auth_strategy(&self) -> AuthStrategy {
        AuthStrategy::WebDavOrP2P
    }

    /// Never "cached" in the debrid sense: a P2P stream is always
    /// playable on demand, which the resolution service should read as
    /// "go straight to resolve".
    async fn check(&self, info_hashes: &[InfoHash]) -> Result<HashMap<InfoHash, bool>, ProviderError> {
        Ok(info_hashes.iter().map(|hash| (hash.clone(), true)).collect())
    }

    async fn submit(&self, info_hash: &InfoHash, _magnet: &str) -> Result<String, ProviderError> {
        Ok(info_hash.as_str().to_string())
    }

    async fn resolve(&self, info_hash: &InfoHash, _file_hint: Option<&str>) -> Result<String, ProviderError> {
        Ok(info_hash.magnet_base())
    }

    async fn list_active(&self) -> Result<Vec<ActiveJob>, ProviderError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn check_always_reports_cached() {
        let hash = InfoHash::parse(&"a".repeat(40)).unwrap();
        let result = P2pProvider::new().check(&[hash.clone()]).await.unwrap();
        assert_eq!(result.get(&hash), Some(&true));
    }

    #[tokio::test]
    async fn resolve_returns_the_magnet_link_itself() {
        let hash = InfoHash::parse(&"a".repeat(40)).unwrap();
        let url = P2pProvider::new().resolve(&hash, None).await.unwrap();
        assert_eq!(url, hash.magnet_base());
    }
}
