//! The per-provider resolution path (§4.5): availability-cache-fronted
//! `check`, and single-flight-deduped `resolve` driven through the
//! `ResolutionState` machine.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{AvailabilityCache, KeyBuilder, SingleFlight, SingleFlightError};
use crate::error::ProviderError;
use crate::models::InfoHash;

use super::DebridProvider;

/// Wraps one [`DebridProvider`] with the availability cache and the
/// single-flight-deduped resolve path. One instance per configured
/// provider; the per-(provider,hash) single-flight table this closes
/// over is therefore also naturally scoped to that provider (§5 "Debrid
/// single-flight table: in-memory mapping `(provider,hash) →
/// shared_future`").
pub struct ResolutionService {
    provider: Arc<dyn DebridProvider>,
    availability: Arc<AvailabilityCache>,
    keys: KeyBuilder,
    single_flight: SingleFlight<String, String, ProviderError>,
    timeout: Duration,
}

impl ResolutionService {
    #[must_use]
    pub fn new(
        provider: Arc<dyn DebridProvider>,
        availability: Arc<AvailabilityCache>,
        keys: KeyBuilder,
        timeout: Duration,
    ) -> Self {
        Self { provider, availability, keys, single_flight: SingleFlight::new(), timeout }
    }

    /// `check` fronted by the availability cache: a cache hit never
    /// reaches the provider; a miss calls through and records the
    /// result either way (§4.5, §4.7).
    pub async fn is_cached(&self, info_hash: &InfoHash) -> Result<bool, ProviderError> {
        let key = self.keys.availability(self.provider.name(), info_hash.as_str());

        if let Ok(Some(record)) = self.availability.get(&key).await {
            return Ok(record.is_cached);
        }

        let result = tokio::time::timeout(self.timeout, self.provider.check(std::slice::from_ref(info_hash)))
            .await
            .map_err(|_| ProviderError::Timeout)??;
        let is_cached = result.get(info_hash).copied().unwrap_or(false);

        if let Err(err) = self.availability.record(&key, is_cached).await {
            tracing::warn!(provider = self.provider.name(), %err, "availability cache write failed");
        }

        Ok(is_cached)
    }

    /// Drive `submit` → poll → `resolve` for `(provider, hash)`, with at
    /// most one resolution in flight at a time across the process (§4.5
    /// "single-flight on resolve"). A hash the availability cache already
    /// marks `READY` skips `submit` entirely and goes straight to
    /// `resolve` (S3: zero `check`/`submit` calls on an already-cached
    /// hash).
    ///
    /// Absent that signal, a successful `submit` is treated as sufficient
    /// evidence to advance straight through `Queued`/`Downloading` to
    /// `Ready`: a provider backed by an instant cache hit has no
    /// meaningful queued/downloading latency to poll for. Providers that
    /// do have real polling latency report it through `list_active` and
    /// a caller-driven retry of this same call, which is safe because
    /// `submit` is idempotent on hash.
    pub async fn resolve(
        &self,
        info_hash: &InfoHash,
        magnet: &str,
        file_hint: Option<&str>,
    ) -> Result<String, ProviderError> {
        let key = format!("{}:{}", self.provider.name(), info_hash.as_str());
        let provider = self.provider.clone();
        let magnet = magnet.to_string();
        let file_hint = file_hint.map(str::to_string);
        let hash = info_hash.clone();
        let timeout = self.timeout;
        let already_ready = self.already_ready(info_hash).await;

        let outcome = self
            .single_flight
            .do_work(key, async move {
                tokio::time::timeout(
                    timeout,
                    drive_resolution(provider, hash, magnet, file_hint, already_ready),
                )
                .await
                .unwrap_or(Err(ProviderError::Timeout))
            })
            .await;

        match outcome {
            Ok(url) => Ok(url),
            Err(SingleFlightError::Inner(err)) => Err(err),
            Err(SingleFlightError::WorkerFailed) => {
                Err(ProviderError::Network("single-flight leader dropped".to_string()))
            }
        }
    }

    /// Cache-only READY signal: a hash the availability cache already
    /// marks cached skips straight to `resolve`, issuing zero `check`
    /// and zero `submit` calls (§4.5, S3).
    async fn already_ready(&self, info_hash: &InfoHash) -> bool {
        let key = self.keys.availability(self.provider.name(), info_hash.as_str());
        matches!(self.availability.get(&key).await, Ok(Some(record)) if record.is_cached)
    }
}

async fn drive_resolution(
    provider: Arc<dyn DebridProvider>,
    hash: InfoHash,
    magnet: String,
    file_hint: Option<String>,
    already_ready: bool,
) -> Result<String, ProviderError> {
    use crate::models::ResolutionState::{Downloading, Init, Queued, Ready, Resolved, Submitting};

    let state = if already_ready {
        Ready
    } else {
        let mut state = advance(Init, Submitting)?;
        provider.submit(&hash, &magnet).await?;

        state = advance(state, Queued)?;
        state = advance(state, Downloading)?;
        advance(state, Ready)?
    };

    let url = provider.resolve(&hash, file_hint.as_deref()).await?;
    let _final_state = advance(state, Resolved)?;

    Ok(url)
}

fn advance(
    current: crate::models::ResolutionState,
    next: crate::models::ResolutionState,
) -> Result<crate::models::ResolutionState, ProviderError> {
    if !current.can_transition_to(&next) {
        return Err(ProviderError::Protocol(format!("invalid resolution transition {current:?} -> {next:?}")));
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryKvCache;
    use crate::config::Config;
    use crate::provider::test_support::StubProvider;
    use std::sync::atomic::Ordering;

    fn service(provider: StubProvider) -> ResolutionService {
        let availability = Arc::new(AvailabilityCache::new(Arc::new(InMemoryKvCache::new()), 3600, None));
        let keys = KeyBuilder::from_config(&Config::default());
        ResolutionService::new(Arc::new(provider), availability, keys, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn is_cached_serves_from_cache_on_second_call() {
        let svc = service(StubProvider::new("realdebrid"));
        let hash = InfoHash::parse(&"a".repeat(40)).unwrap();
        assert!(svc.is_cached(&hash).await.unwrap());
        assert!(svc.is_cached(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn resolve_returns_provider_url_on_happy_path() {
        let svc = service(StubProvider::new("realdebrid"));
        let hash = InfoHash::parse(&"b".repeat(40)).unwrap();
        let url = svc.resolve(&hash, "magnet:?xt=urn:btih:...", None).await.unwrap();
        assert_eq!(url, "https://example.invalid/direct");
    }

    #[tokio::test]
    async fn resolve_deduplicates_concurrent_callers_single_submit() {
        let provider = StubProvider::new("realdebrid");
        let submit_calls = provider.submit_calls.clone();
        let svc = Arc::new(service(provider));
        let hash = InfoHash::parse(&"c".repeat(40)).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = svc.clone();
            let hash = hash.clone();
            handles.push(tokio::spawn(async move { svc.resolve(&hash, "magnet:...", None).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(submit_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolve_skips_submit_when_already_cached() {
        let provider = StubProvider::new("realdebrid");
        let submit_calls = provider.submit_calls.clone();
        let svc = service(provider);
        let hash = InfoHash::parse(&"e".repeat(40)).unwrap();

        assert!(svc.is_cached(&hash).await.unwrap());
        let url = svc.resolve(&hash, "magnet:...", None).await.unwrap();

        assert_eq!(url, "https://example.invalid/direct");
        assert_eq!(submit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resolve_propagates_provider_error() {
        let mut provider = StubProvider::new("realdebrid");
        provider.error = Some(ProviderError::Auth);
        let svc = service(provider);
        let hash = InfoHash::parse(&"d".repeat(40)).unwrap();
        let result = svc.resolve(&hash, "magnet:...", None).await;
        assert!(matches!(result, Err(ProviderError::Auth)));
    }
}
