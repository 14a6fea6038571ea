//! JWT service for session token generation and validation
//!
//! Session tokens are stateless HS256 JWTs carrying the user id (`uid`), the
//! issue time (`iat`) and the expiry (`exp`), both in Unix seconds. Validity
//! depends only on the signature, the embedded expiry and the current time.

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Longest accepted session lifetime: one year
pub const MAX_EXPIRES_MINUTES: i64 = 366 * 24 * 60;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret used to sign and verify tokens
    pub secret: String,
    /// Session lifetime in minutes (default: 60)
    pub expires_minutes: i64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: HMAC secret (required, non-empty)
    /// - `JWT_EXPIRES_MINUTES`: Session lifetime in minutes (default: 60, at most one year)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|secret| !secret.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;

        let expires_minutes = std::env::var("JWT_EXPIRES_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        Ok(JwtConfig {
            secret,
            expires_minutes,
        })
    }
}

/// Session token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub uid: String,
    /// Issued at time
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        if config.secret.is_empty() {
            anyhow::bail!("JWT secret must not be empty");
        }
        if !(0..=MAX_EXPIRES_MINUTES).contains(&config.expires_minutes) {
            anyhow::bail!(
                "JWT lifetime must be between 0 and {} minutes, got {}",
                MAX_EXPIRES_MINUTES,
                config.expires_minutes
            );
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        // Expiry is enforced below with a hard `now >= exp` boundary.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    /// Generate a session token for a user
    pub fn generate(&self, user_id: Uuid) -> AuthResult<String> {
        self.generate_at(user_id, Utc::now().timestamp())
    }

    fn generate_at(&self, user_id: Uuid, now: i64) -> AuthResult<String> {
        let exp = now
            .checked_add(self.config.expires_minutes * 60)
            .ok_or_else(|| AuthError::Internal("session expiry out of range".to_string()))?;
        let claims = Claims {
            uid: user_id.to_string(),
            iat: now,
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            error!("Failed to sign session token: {}", e);
            AuthError::Internal("failed to sign session token".to_string())
        })
    }

    /// Validate a token and return the claims
    pub fn parse(&self, token: &str) -> AuthResult<Claims> {
        self.parse_at(token, Utc::now().timestamp())
    }

    fn parse_at(&self, token: &str, now: i64) -> AuthResult<Claims> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                debug!("Session token rejected: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                    _ => AuthError::InvalidToken,
                }
            })?;

        let claims = token_data.claims;
        if now >= claims.exp {
            return Err(AuthError::ExpiredToken);
        }
        Ok(claims)
    }

    /// Get the session lifetime in minutes
    pub fn session_lifetime(&self) -> i64 {
        self.config.expires_minutes
    }
}
