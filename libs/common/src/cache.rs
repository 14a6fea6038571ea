//! Expiring key-value store
//!
//! This module provides the [`ExpiringStore`] capability used for short-lived
//! state (one-time codes, rate-limit counters) together with a Redis-backed
//! implementation and an in-process implementation for tests.

use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisResult, Script, aio::MultiplexedConnection};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult};

/// Deletes `KEYS[1]` only when it currently holds `ARGV[1]`.
const DELETE_IF_EQUALS_LUA: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Increments `KEYS[1]` and re-arms its expiry to `ARGV[2]` milliseconds,
/// unless the counter already reached `ARGV[1]`, in which case -1 is returned.
const INCR_WITHIN_LIMIT_LUA: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current >= tonumber(ARGV[1]) then
    return -1
end
local value = redis.call('INCR', KEYS[1])
redis.call('PEXPIRE', KEYS[1], ARGV[2])
return value
"#;

/// A shared key-value store whose entries may carry an expiry.
///
/// Every operation goes to the backing store; nothing is cached in-process.
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Get a value by key. Absent and expired keys both yield `None`.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a value, overwriting any previous one, with an optional TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete a key. Returns `true` when a live key was removed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Increment an integer counter, creating it at zero when absent.
    async fn incr(&self, key: &str) -> CacheResult<i64>;

    /// Set the expiry of an existing key. Returns `false` when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Atomically delete `key` if and only if it currently holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> CacheResult<bool>;

    /// Atomically increment the counter at `key` unless it already reached
    /// `limit`. On increment the key's expiry is re-armed to `window` and the
    /// new value is returned; at the limit nothing is mutated and `None` is
    /// returned.
    async fn incr_within_limit(
        &self,
        key: &str,
        limit: i64,
        window: Duration,
    ) -> CacheResult<Option<i64>>;

    /// Check if the store is reachable
    async fn health_check(&self) -> CacheResult<bool>;
}

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Deadline applied to every individual command
    pub operation_timeout: Duration,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    /// - `REDIS_OPERATION_TIMEOUT_MS`: Per-command deadline in milliseconds (default: 2000)
    pub fn from_env() -> CacheResult<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let timeout_ms = std::env::var("REDIS_OPERATION_TIMEOUT_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse()
            .unwrap_or(2000);

        Ok(RedisConfig {
            url,
            operation_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // Redis rejects a zero expiry.
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Redis-backed [`ExpiringStore`]
///
/// Holds a single multiplexed connection that is cheap to clone and shared by
/// all concurrent callers.
#[derive(Clone)]
pub struct RedisPool {
    connection: MultiplexedConnection,
    operation_timeout: Duration,
    delete_if_equals: Script,
    incr_within_limit: Script,
}

impl RedisPool {
    /// Connect to Redis and verify the connection with a PING.
    ///
    /// Fails when Redis is unreachable so that start-up aborts instead of
    /// serving in a degraded state.
    pub async fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str()).map_err(CacheError::Connection)?;
        let connection = tokio::time::timeout(
            config.operation_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::Timeout(config.operation_timeout))?
        .map_err(CacheError::Connection)?;

        let pool = RedisPool {
            connection,
            operation_timeout: config.operation_timeout,
            delete_if_equals: Script::new(DELETE_IF_EQUALS_LUA),
            incr_within_limit: Script::new(INCR_WITHIN_LIMIT_LUA),
        };

        pool.health_check().await?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(pool)
    }

    async fn run<T, F>(&self, command: F) -> CacheResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, command).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(self.operation_timeout)),
        }
    }
}

#[async_trait]
impl ExpiringStore for RedisPool {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection.clone();
        self.run(async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        self.run(async move {
            match ttl {
                Some(ttl) => conn.pset_ex::<_, _, ()>(key, value, ttl_millis(ttl)).await,
                None => conn.set::<_, _, ()>(key, value).await,
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        let removed = self
            .run(async move { conn.del::<_, u64>(key).await })
            .await?;
        Ok(removed > 0)
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.connection.clone();
        self.run(async move { conn.incr::<_, _, i64>(key, 1).await })
            .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        self.run(async move {
            let updated: RedisResult<bool> = redis::cmd("PEXPIRE")
                .arg(key)
                .arg(ttl_millis(ttl))
                .query_async(&mut conn)
                .await;
            updated
        })
        .await
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        let script = &self.delete_if_equals;
        let removed = self
            .run(async move {
                let removed: RedisResult<i64> =
                    script.key(key).arg(expected).invoke_async(&mut conn).await;
                removed
            })
            .await?;
        Ok(removed > 0)
    }

    async fn incr_within_limit(
        &self,
        key: &str,
        limit: i64,
        window: Duration,
    ) -> CacheResult<Option<i64>> {
        let mut conn = self.connection.clone();
        let script = &self.incr_within_limit;
        let value = self
            .run(async move {
                let value: RedisResult<i64> = script
                    .key(key)
                    .arg(limit)
                    .arg(ttl_millis(window))
                    .invoke_async(&mut conn)
                    .await;
                value
            })
            .await?;
        Ok((value >= 0).then_some(value))
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        let pong = self
            .run(async move {
                let pong: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
                pong
            })
            .await?;
        Ok(pong == "PONG")
    }
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, Entry>,
    skew: Duration,
}

impl MemoryState {
    fn now(&self) -> Instant {
        Instant::now() + self.skew
    }

    /// Returns the live entry for `key`, evicting it first if it has expired.
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let now = self.now();
        let expired = self
            .entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .is_some_and(|deadline| now >= deadline);
        if expired {
            debug!("Evicting expired key {}", key);
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn counter(&mut self, key: &str) -> CacheResult<i64> {
        match self.live(key) {
            Some(entry) => entry
                .value
                .parse::<i64>()
                .map_err(|e| CacheError::InvalidValue {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(0),
        }
    }

    fn incr(&mut self, key: &str) -> CacheResult<i64> {
        let value = self.counter(key)? + 1;
        match self.live(key) {
            Some(entry) => entry.value = value.to_string(),
            None => {
                self.entries.insert(
                    key.to_string(),
                    Entry {
                        value: value.to_string(),
                        expires_at: None,
                    },
                );
            }
        }
        Ok(value)
    }

    fn expire(&mut self, key: &str, ttl: Duration) -> bool {
        let deadline = self.now() + ttl;
        match self.live(key) {
            Some(entry) => {
                entry.expires_at = Some(deadline);
                true
            }
            None => false,
        }
    }
}

/// In-process [`ExpiringStore`] for tests and local development.
///
/// Its clock can be moved forward with [`InMemoryStore::fast_forward`] to
/// simulate the passage of time without sleeping.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the store's clock by `duration`.
    pub async fn fast_forward(&self, duration: Duration) {
        let mut state = self.state.lock().await;
        state.skew += duration;
    }
}

#[async_trait]
impl ExpiringStore for InMemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut state = self.state.lock().await;
        Ok(state.live(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let mut state = self.state.lock().await;
        let expires_at = ttl.map(|ttl| state.now() + ttl);
        state.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut state = self.state.lock().await;
        let live = state.live(key).is_some();
        state.entries.remove(key);
        Ok(live)
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let mut state = self.state.lock().await;
        state.incr(key)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.expire(key, ttl))
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> CacheResult<bool> {
        let mut state = self.state.lock().await;
        let matches = state
            .live(key)
            .is_some_and(|entry| entry.value == expected);
        if matches {
            state.entries.remove(key);
        }
        Ok(matches)
    }

    async fn incr_within_limit(
        &self,
        key: &str,
        limit: i64,
        window: Duration,
    ) -> CacheResult<Option<i64>> {
        let mut state = self.state.lock().await;
        if state.counter(key)? >= limit {
            return Ok(None);
        }
        let value = state.incr(key)?;
        state.expire(key, window);
        Ok(Some(value))
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_config() -> RedisConfig {
        RedisConfig {
            url: "redis://localhost:6379".to_string(),
            operation_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn test_redis_connection() -> CacheResult<()> {
        let pool = RedisPool::new(&redis_config()).await?;
        assert!(pool.health_check().await?);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn test_redis_set_get_delete() -> CacheResult<()> {
        let pool = RedisPool::new(&redis_config()).await?;

        let key = "test_key";
        let value = "test_value";
        pool.set(key, value, Some(Duration::from_secs(5))).await?;
        assert_eq!(pool.get(key).await?, Some(value.to_string()));

        assert!(pool.delete(key).await?);
        assert_eq!(pool.get(key).await?, None);

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn test_redis_atomic_scripts() -> CacheResult<()> {
        let pool = RedisPool::new(&redis_config()).await?;

        pool.set("test_cad", "123456", Some(Duration::from_secs(5)))
            .await?;
        assert!(!pool.delete_if_equals("test_cad", "654321").await?);
        assert!(pool.delete_if_equals("test_cad", "123456").await?);
        assert!(!pool.delete_if_equals("test_cad", "123456").await?);

        pool.delete("test_capped").await?;
        let window = Duration::from_secs(5);
        assert_eq!(pool.incr_within_limit("test_capped", 2, window).await?, Some(1));
        assert_eq!(pool.incr_within_limit("test_capped", 2, window).await?, Some(2));
        assert_eq!(pool.incr_within_limit("test_capped", 2, window).await?, None);
        pool.delete("test_capped").await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_memory_set_get_delete() -> CacheResult<()> {
        let store = InMemoryStore::new();

        store.set("k", "v", None).await?;
        assert_eq!(store.get("k").await?, Some("v".to_string()));

        store.set("k", "w", None).await?;
        assert_eq!(store.get("k").await?, Some("w".to_string()));

        assert!(store.delete("k").await?);
        assert!(!store.delete("k").await?);
        assert_eq!(store.get("k").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_ttl_expires_on_fast_forward() -> CacheResult<()> {
        let store = InMemoryStore::new();
        store.set("k", "v", Some(Duration::from_secs(1))).await?;

        store.fast_forward(Duration::from_millis(500)).await;
        assert_eq!(store.get("k").await?, Some("v".to_string()));

        store.fast_forward(Duration::from_millis(600)).await;
        assert_eq!(store.get("k").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_incr_and_expire() -> CacheResult<()> {
        let store = InMemoryStore::new();
        assert!(!store.expire("counter", Duration::from_secs(1)).await?);

        assert_eq!(store.incr("counter").await?, 1);
        assert_eq!(store.incr("counter").await?, 2);
        assert!(store.expire("counter", Duration::from_secs(1)).await?);

        store.fast_forward(Duration::from_secs(2)).await;
        assert_eq!(store.get("counter").await?, None);
        assert_eq!(store.incr("counter").await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_incr_rejects_non_integer() -> CacheResult<()> {
        let store = InMemoryStore::new();
        store.set("k", "abc", None).await?;
        assert!(matches!(
            store.incr("k").await,
            Err(CacheError::InvalidValue { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_delete_if_equals() -> CacheResult<()> {
        let store = InMemoryStore::new();
        store.set("k", "123456", None).await?;

        assert!(!store.delete_if_equals("k", "000000").await?);
        assert_eq!(store.get("k").await?, Some("123456".to_string()));

        assert!(store.delete_if_equals("k", "123456").await?);
        assert!(!store.delete_if_equals("k", "123456").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_incr_within_limit_rearms_window() -> CacheResult<()> {
        let store = InMemoryStore::new();
        let window = Duration::from_secs(60);

        assert_eq!(store.incr_within_limit("rate", 2, window).await?, Some(1));
        store.fast_forward(Duration::from_secs(50)).await;
        assert_eq!(store.incr_within_limit("rate", 2, window).await?, Some(2));

        // The second increment pushed the deadline out to 110s.
        store.fast_forward(Duration::from_secs(50)).await;
        assert_eq!(store.incr_within_limit("rate", 2, window).await?, None);

        store.fast_forward(Duration::from_secs(10)).await;
        assert_eq!(store.incr_within_limit("rate", 2, window).await?, Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_concurrent_consumption_is_single_use() -> CacheResult<()> {
        let store = InMemoryStore::new();
        store.set("otp", "111111", None).await?;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.delete_if_equals("otp", "111111").await })
            })
            .collect();

        let mut consumed = 0;
        for handle in handles {
            if handle.await.expect("task panicked")? {
                consumed += 1;
            }
        }
        assert_eq!(consumed, 1);
        Ok(())
    }
}
