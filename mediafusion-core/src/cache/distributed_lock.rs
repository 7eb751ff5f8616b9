//! Redis-backed distributed lock, used for the scheduler leader election
//! (§4.7: `setnx("scheduler:leader", node_id, 60s)`, refreshed every 20s).

use redis::aio::ConnectionManager as RedisConnectionManager;
use redis::Script;
use std::future::Future;

use crate::error::{Error, Result};
use crate::models::generate_token;

#[derive(Clone)]
pub struct DistributedLock {
    redis: RedisConnectionManager,
}

impl DistributedLock {
    #[must_use]
    pub const fn new(redis: RedisConnectionManager) -> Self {
        Self { redis }
    }

    /// `SET key value NX EX ttl`. Returns the lock token on success.
    pub async fn acquire(&self, key: &str, ttl_seconds: u64) -> Result<Option<String>> {
        let lock_key = format!("lock:{key}");
        let lock_value = generate_token();
        let mut conn = self.redis.clone();

        let result: Option<String> = redis::cmd("SET")
            .arg(&lock_key)
            .arg(&lock_value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        if result.is_some() {
            tracing::debug!(lock_key = %lock_key, ttl_seconds, "lock acquired");
            Ok(Some(lock_value))
        } else {
            Ok(None)
        }
    }

    /// Release only if the caller still holds the token (compare-and-delete
    /// via Lua, so a lock already reacquired by someone else is untouched).
    pub async fn release(&self, key: &str, lock_value: &str) -> Result<bool> {
        let lock_key = format!("lock:{key}");
        let script = Script::new(
            r"
            if redis.call('GET', KEYS[1]) == ARGV[1] then
                return redis.call('DEL', KEYS[1])
            else
                return 0
            end
            ",
        );
        let mut conn = self.redis.clone();
        let result: i32 = script.key(&lock_key).arg(lock_value).invoke_async(&mut conn).await?;
        Ok(result == 1)
    }

    /// Refresh TTL, only if the caller still holds the token. Used by a
    /// scheduler leader to extend its lease every 20s.
    pub async fn extend(&self, key: &str, lock_value: &str, ttl_seconds: u64) -> Result<bool> {
        let lock_key = format!("lock:{key}");
        let script = Script::new(
            r"
            if redis.call('GET', KEYS[1]) == ARGV[1] then
                return redis.call('EXPIRE', KEYS[1], ARGV[2])
            else
                return 0
            end
            ",
        );
        let mut conn = self.redis.clone();
        let result: i32 = script
            .key(&lock_key)
            .arg(lock_value)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await?;
        Ok(result == 1)
    }

    pub async fn with_lock<F, Fut, T>(&self, key: &str, ttl_seconds: u64, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let lock_value = self
            .acquire(key, ttl_seconds)
            .await?
            .ok_or_else(|| Error::Internal(format!("failed to acquire lock: {key}")))?;

        let result = operation().await;

        if let Err(e) = self.release(key, &lock_value).await {
            tracing::error!(key, error = %e, "failed to release lock after operation");
        }

        result
    }
}

/// RAII guard that releases the lock on drop (best-effort, spawned).
pub struct LockGuard {
    lock: DistributedLock,
    key: String,
    value: String,
}

impl LockGuard {
    pub async fn new(lock: DistributedLock, key: String, ttl_seconds: u64) -> Result<Self> {
        let value = lock
            .acquire(&key, ttl_seconds)
            .await?
            .ok_or_else(|| Error::Internal(format!("failed to acquire lock: {key}")))?;
        Ok(Self { lock, key, value })
    }

    pub async fn extend(&self, ttl_seconds: u64) -> Result<bool> {
        self.lock.extend(&self.key, &self.value, ttl_seconds).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let lock = self.lock.clone();
        let key = self.key.clone();
        let value = self.value.clone();
        tokio::spawn(async move {
            if let Err(e) = lock.release(&key, &value).await {
                tracing::error!(key, error = %e, "failed to release lock in drop");
            }
        });
    }
}
