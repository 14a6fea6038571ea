//! Application configuration

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Environment in which codes are written to the log instead of being delivered
pub const DEVELOPMENT_ENV: &str = "development";

/// Settings for one-time code issuance
#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// Lifetime of an issued code
    pub ttl: Duration,
    /// Maximum issuances per phone within one window
    pub rate_limit_max: u32,
    /// Duration of the issuance window, re-armed on each issuance
    pub rate_limit_window: Duration,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            rate_limit_max: 3,
            rate_limit_window: Duration::from_secs(60),
        }
    }
}

/// Application-level settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port the HTTP server listens on
    pub port: u16,
    /// Deployment environment name
    pub env: String,
    /// Global request limit per client and minute
    pub rate_limit_per_minute: u32,
    /// One-time code settings
    pub otp: OtpConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Create a new AppConfig from environment variables
    ///
    /// # Environment Variables
    /// - `APP_PORT`: Listen port (default: 8080)
    /// - `APP_ENV`: Environment name (default: "development")
    /// - `RATE_LIMIT_PER_MINUTE`: Global per-client request limit (default: 60)
    /// - `OTP_TTL_SECONDS`: Code lifetime (default: 300)
    /// - `OTP_RATE_LIMIT_MAX`: Issuances allowed per window (default: 3)
    /// - `OTP_RATE_LIMIT_WINDOW_SECONDS`: Issuance window (default: 60)
    pub fn from_env() -> Result<Self> {
        let defaults = OtpConfig::default();
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| DEVELOPMENT_ENV.to_string());

        let config = AppConfig {
            port: env_or("APP_PORT", 8080),
            env,
            rate_limit_per_minute: env_or("RATE_LIMIT_PER_MINUTE", 60),
            otp: OtpConfig {
                ttl: Duration::from_secs(env_or("OTP_TTL_SECONDS", defaults.ttl.as_secs())),
                rate_limit_max: env_or("OTP_RATE_LIMIT_MAX", defaults.rate_limit_max),
                rate_limit_window: Duration::from_secs(env_or(
                    "OTP_RATE_LIMIT_WINDOW_SECONDS",
                    defaults.rate_limit_window.as_secs(),
                )),
            },
        };

        info!(
            "Config loaded: env={} port={} otp_ttl={:?} otp_rate={}/{:?}",
            config.env,
            config.port,
            config.otp.ttl,
            config.otp.rate_limit_max,
            config.otp.rate_limit_window
        );
        Ok(config)
    }

    /// Whether issued codes should be surfaced through the log
    pub fn is_development(&self) -> bool {
        self.env == DEVELOPMENT_ENV
    }
}

/// Load `.env`, falling back to `sample.env`, into the process environment.
///
/// Returns the file that was loaded. Missing files are not an error; the
/// system environment is used as is.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv()
        .or_else(|_| dotenvy::from_filename("sample.env"))
        .ok()
}
