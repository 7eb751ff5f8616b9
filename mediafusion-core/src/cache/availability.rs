//! The Availability Cache (§4.5, §4.7): a cache layer in front of every
//! provider's `check`. Bidirectional — reads before calling the
//! provider, writes after any positive check — with an optional
//! write-through sync to a configured peer ("central hub").

use std::sync::Arc;

use crate::cache::KvCache;
use crate::error::Result;
use crate::models::AvailabilityRecord;

/// Bidirectional availability cache fronting a [`crate::provider::DebridProvider`].
///
/// `ttl` matches §4.7's 7-day default; callers override per deployment
/// via [`crate::config::CacheConfig::availability_ttl_seconds`].
pub struct AvailabilityCache {
    kv: Arc<dyn KvCache>,
    ttl_seconds: u64,
    central_hub: Option<CentralHubClient>,
}

impl AvailabilityCache {
    #[must_use]
    pub fn new(kv: Arc<dyn KvCache>, ttl_seconds: u64, central_hub: Option<CentralHubClient>) -> Self {
        Self { kv, ttl_seconds, central_hub }
    }

    /// Read the cached fact for `(provider, hash)`, or `None` on a miss —
    /// a miss means the caller must fall through to the provider's own
    /// `check` and then call [`Self::record`].
    pub async fn get(&self, key: &str) -> Result<Option<AvailabilityRecord>> {
        let Some(bytes) = self.kv.get(key).await? else { return Ok(None) };
        let record: AvailabilityRecord = serde_json::from_slice(&bytes)?;
        if record.is_expired() {
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Batch-check a set of keys, returning only the hits. Callers pair
    /// this with provider `check()` for the remainder (§4.5
    /// `check(info_hashes[]) → mapping<hash, bool>`).
    pub async fn get_many(&self, keys: &[String]) -> Result<std::collections::HashMap<String, bool>> {
        let mut out = std::collections::HashMap::new();
        for key in keys {
            if let Some(record) = self.get(key).await? {
                out.insert(key.clone(), record.is_cached);
            }
        }
        Ok(out)
    }

    /// Record a provider `check` result. Per §8 invariant 5, only a
    /// positive result needs to land here for the TTL window to start;
    /// negative results may also be cached to avoid re-querying flapping
    /// misses, at the caller's discretion.
    pub async fn record(&self, key: &str, is_cached: bool) -> Result<()> {
        let record = AvailabilityRecord::fresh(is_cached, chrono::Duration::seconds(self.ttl_seconds as i64));
        let bytes = serde_json::to_vec(&record)?;
        self.kv.set(key, &bytes, Some(self.ttl_seconds)).await?;

        if is_cached {
            if let Some(hub) = &self.central_hub {
                hub.push_positive(key).await;
            }
        }
        Ok(())
    }
}

/// Write-through sync to a configured peer instance (§4.5 "central hub").
/// Failures are logged and swallowed — propagating positive availability
/// to peers is an optimization, not a correctness requirement.
pub struct CentralHubClient {
    http: reqwest::Client,
    endpoint: String,
}

impl CentralHubClient {
    #[must_use]
    pub fn new(http: reqwest::Client, endpoint: String) -> Self {
        Self { http, endpoint }
    }

    pub async fn push_positive(&self, key: &str) {
        let body = serde_json::json!({ "key": key, "is_cached": true });
        if let Err(err) = self.http.post(&self.endpoint).json(&body).send().await {
            tracing::warn!(endpoint = %self.endpoint, error = %err, "central hub sync failed");
        }
    }
}
