//! One-time code issuance and verification
//!
//! Codes are six-digit numbers stored per phone number in the expiring store
//! under `otp:<phone>`; issuance is capped per phone by a counter stored under
//! `otp:rate:<phone>` whose window is re-armed on every successful issuance.

use rand::{Rng, rngs::OsRng};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::OtpConfig;
use crate::error::{AuthError, AuthResult};
use common::cache::ExpiringStore;

const KEY_PREFIX: &str = "otp:";
const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

fn code_key(phone: &str) -> String {
    format!("{}{}", KEY_PREFIX, phone.trim())
}

fn rate_limit_key(phone: &str) -> String {
    format!("{}rate:{}", KEY_PREFIX, phone.trim())
}

/// Draw a uniformly random six-digit code from the operating system RNG.
fn generate_code() -> String {
    let value = OsRng.gen_range(CODE_MIN..=CODE_MAX);
    format!("{:06}", value)
}

/// One-time code service
#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn ExpiringStore>,
    config: OtpConfig,
}

impl OtpService {
    /// Create a new one-time code service on top of an expiring store
    pub fn new(store: Arc<dyn ExpiringStore>, config: OtpConfig) -> Self {
        Self { store, config }
    }

    /// Issue a fresh code for `phone`, replacing any live one.
    ///
    /// The issuance counter is checked and incremented in a single store
    /// operation, so concurrent callers cannot overshoot the limit.
    pub async fn generate(&self, phone: &str) -> AuthResult<String> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(AuthError::Validation("phone required".to_string()));
        }

        let issued = self
            .store
            .incr_within_limit(
                &rate_limit_key(phone),
                i64::from(self.config.rate_limit_max),
                self.config.rate_limit_window,
            )
            .await?;

        let Some(issued) = issued else {
            warn!("Code issuance rate limit reached for {}", phone);
            return Err(AuthError::RateLimitExceeded);
        };

        let code = generate_code();
        self.store
            .set(&code_key(phone), &code, Some(self.config.ttl))
            .await?;

        info!(
            "Issued one-time code for {} ({}/{} in window)",
            phone, issued, self.config.rate_limit_max
        );
        Ok(code)
    }

    /// Check `code` against the live code for `phone`, consuming it on match.
    ///
    /// A missing, expired or mismatching code yields `Ok(false)`; only store
    /// failures are errors. A mismatch leaves the stored code in place.
    pub async fn verify(&self, phone: &str, code: &str) -> AuthResult<bool> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(false);
        }

        let consumed = self.store.delete_if_equals(&code_key(phone), code).await?;
        if consumed {
            info!("One-time code consumed for {}", phone.trim());
        } else {
            debug!("One-time code did not verify for {}", phone.trim());
        }
        Ok(consumed)
    }
}
