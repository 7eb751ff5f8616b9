//! The shared key-value cache (§4.7): byte-value payloads, one backend
//! shared by every subsystem that needs `get/set/del/scan/hget/hset/
//! zadd/zrangebyscore/setnx`.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{CacheError, Result};

#[async_trait]
pub trait KvCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8], ttl_seconds: Option<u64>) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;
    /// Non-scanning backends (e.g. a pure TTL store) may return every
    /// live key under `prefix` eagerly; §4.2 notes this satisfies the
    /// sweep contract implicitly.
    async fn scan(&self, prefix: &str) -> Result<Vec<String>>;
    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>>;
    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<()>;
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;
    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>>;
    /// Atomic "set if absent", used for distributed locks and dedup
    /// tokens. Returns `true` if this call performed the write.
    async fn setnx(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<bool>;
}

/// Redis-backed `KvCache` (§4.7's primary backend).
#[derive(Clone)]
pub struct RedisKvCache {
    conn: ConnectionManager,
}

impl RedisKvCache {
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl KvCache for RedisKvCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await.map_err(CacheError::from)?)
    }

    async fn set(&self, key: &str, value: &[u8], ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl_seconds {
            Some(ttl) if ttl > 0 => {
                let _: () = conn.set_ex(key, value, ttl).await.map_err(CacheError::from)?;
            }
            _ => {
                let _: () = conn.set(key, value).await.map_err(CacheError::from)?;
            }
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(CacheError::from)?;
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        let keys: Vec<String> = conn.keys(pattern).await.map_err(CacheError::from)?;
        Ok(keys)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        Ok(conn.hget(key, field).await.map_err(CacheError::from)?)
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, field, value).await.map_err(CacheError::from)?;
        Ok(())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(key, member, score).await.map_err(CacheError::from)?;
        Ok(())
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.zrangebyscore(key, min, max).await.map_err(CacheError::from)?)
    }

    async fn setnx(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(CacheError::from)?;
        Ok(result.is_some())
    }
}

struct Entry {
    value: Vec<u8>,
    expires_at: Option<std::time::Instant>,
}

/// In-memory `KvCache` for tests and single-node deployments without
/// Redis. Backed by a lock-guarded map rather than `dashmap` because the
/// sorted-set operations need ordered iteration over all entries.
#[derive(Clone, Default)]
pub struct InMemoryKvCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    hashes: Arc<RwLock<HashMap<String, HashMap<String, Vec<u8>>>>>,
    zsets: Arc<RwLock<HashMap<String, Vec<(String, f64)>>>>,
}

impl InMemoryKvCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(entry: &Entry) -> bool {
        match entry.expires_at {
            Some(at) => at > std::time::Instant::now(),
            None => true,
        }
    }
}

#[async_trait]
impl KvCache for InMemoryKvCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).filter(|e| Self::is_live(e)).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl_seconds: Option<u64>) -> Result<()> {
        let expires_at = ttl_seconds
            .filter(|t| *t > 0)
            .map(|t| std::time::Instant::now() + std::time::Duration::from_secs(t));
        self.entries.write().await.insert(
            key.to_string(),
            Entry { value: value.to_vec(), expires_at },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && Self::is_live(e))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>> {
        let hashes = self.hashes.read().await;
        Ok(hashes.get(key).and_then(|h| h.get(field)).cloned())
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<()> {
        let mut hashes = self.hashes.write().await;
        hashes.entry(key.to_string()).or_default().insert(field.to_string(), value.to_vec());
        Ok(())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut zsets = self.zsets.write().await;
        let set = zsets.entry(key.to_string()).or_default();
        set.retain(|(m, _)| m != member);
        set.push((member.to_string(), score));
        Ok(())
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
        let zsets = self.zsets.read().await;
        let Some(set) = zsets.get(key) else { return Ok(Vec::new()) };
        let mut matches: Vec<(String, f64)> =
            set.iter().filter(|(_, score)| *score >= min && *score <= max).cloned().collect();
        matches.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(matches.into_iter().map(|(m, _)| m).collect())
    }

    async fn setnx(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<bool> {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(key) {
            if Self::is_live(existing) {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: Some(std::time::Instant::now() + std::time::Duration::from_secs(ttl_seconds)),
            },
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let cache = InMemoryKvCache::new();
        cache.set("k", b"v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn setnx_rejects_when_already_set() {
        let cache = InMemoryKvCache::new();
        assert!(cache.setnx("lock", b"a", 10).await.unwrap());
        assert!(!cache.setnx("lock", b"b", 10).await.unwrap());
    }

    #[tokio::test]
    async fn del_removes_key() {
        let cache = InMemoryKvCache::new();
        cache.set("k", b"v", None).await.unwrap();
        cache.del("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn scan_filters_by_prefix() {
        let cache = InMemoryKvCache::new();
        cache.set("avail:a", b"1", None).await.unwrap();
        cache.set("scraper:b", b"1", None).await.unwrap();
        let keys = cache.scan("avail:").await.unwrap();
        assert_eq!(keys, vec!["avail:a".to_string()]);
    }

    #[tokio::test]
    async fn zrangebyscore_returns_sorted_members_in_range() {
        let cache = InMemoryKvCache::new();
        cache.zadd("events", "a", 3.0).await.unwrap();
        cache.zadd("events", "b", 1.0).await.unwrap();
        cache.zadd("events", "c", 2.0).await.unwrap();
        assert_eq!(cache.zrangebyscore("events", 1.0, 2.0).await.unwrap(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn expired_entry_is_not_returned() {
        let cache = InMemoryKvCache::new();
        cache.set("k", b"v", Some(0)).await.unwrap();
        // ttl 0 means "no expiry" per the set() contract, mirroring Redis SET EX semantics
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    }
}
