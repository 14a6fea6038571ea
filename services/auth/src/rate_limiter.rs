//! Per-client request limiter guarding the whole HTTP surface

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Number of tracked clients above which stale windows are swept
const SWEEP_THRESHOLD: usize = 10_000;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of requests allowed per window
    pub max_requests: u32,
    /// Time window
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimiterConfig {
    /// Limit of `max_requests` per minute
    pub fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            ..Self::default()
        }
    }
}

/// Rate limiter entry
#[derive(Debug)]
struct RateLimiterEntry {
    /// Number of requests in the current window
    requests: u32,
    /// Start of the current window
    window_start: Instant,
}

/// Fixed-window rate limiter keyed by client
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Rate limiter configuration
    config: RateLimiterConfig,
    /// Rate limiter entries
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check if a client is allowed to make a request, counting it if so
    pub async fn is_allowed(&self, key: &str) -> bool {
        self.is_allowed_at(key, Instant::now()).await
    }

    async fn is_allowed_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;
        let window = self.config.window;

        if entries.len() > SWEEP_THRESHOLD {
            entries.retain(|_, entry| now.duration_since(entry.window_start) < window);
            debug!("Swept rate limiter entries, {} remain", entries.len());
        }

        let entry = entries
            .entry(key.to_string())
            .or_insert(RateLimiterEntry {
                requests: 0,
                window_start: now,
            });

        // Start a new window once the current one has elapsed
        if now.duration_since(entry.window_start) >= window {
            entry.requests = 0;
            entry.window_start = now;
        }

        if entry.requests >= self.config.max_requests {
            warn!("Request limit reached for client {}", key);
            return false;
        }

        entry.requests += 1;
        true
    }

    /// Get the rate limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}
