//! Test doubles shared across the service's unit tests

use async_trait::async_trait;
use common::cache::ExpiringStore;
use common::error::{CacheError, CacheResult};
use std::time::Duration;

/// Deadline reported by [`UnavailableStore`] failures
pub const STORE_TIMEOUT: Duration = Duration::from_millis(2000);

/// An [`ExpiringStore`] whose every operation times out
#[derive(Clone, Copy, Default)]
pub struct UnavailableStore;

fn timed_out<T>() -> CacheResult<T> {
    Err(CacheError::Timeout(STORE_TIMEOUT))
}

#[async_trait]
impl ExpiringStore for UnavailableStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        timed_out()
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> CacheResult<()> {
        timed_out()
    }

    async fn delete(&self, _key: &str) -> CacheResult<bool> {
        timed_out()
    }

    async fn incr(&self, _key: &str) -> CacheResult<i64> {
        timed_out()
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> CacheResult<bool> {
        timed_out()
    }

    async fn delete_if_equals(&self, _key: &str, _expected: &str) -> CacheResult<bool> {
        timed_out()
    }

    async fn incr_within_limit(
        &self,
        _key: &str,
        _limit: i64,
        _window: Duration,
    ) -> CacheResult<Option<i64>> {
        timed_out()
    }

    async fn health_check(&self) -> CacheResult<bool> {
        timed_out()
    }
}
