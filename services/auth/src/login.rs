//! Phone login flow: code request, code verification and session issuance

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    error::{AuthError, AuthResult},
    jwt::JwtService,
    otp::OtpService,
    repositories::UserRepository,
};

/// Orchestrates one-time codes, user resolution and session tokens
#[derive(Clone)]
pub struct LoginFlow {
    otp_service: OtpService,
    jwt_service: JwtService,
    user_repository: Arc<dyn UserRepository>,
    /// Write issued codes to the log instead of delivering them
    log_codes: bool,
}

impl LoginFlow {
    pub fn new(
        otp_service: OtpService,
        jwt_service: JwtService,
        user_repository: Arc<dyn UserRepository>,
        log_codes: bool,
    ) -> Self {
        Self {
            otp_service,
            jwt_service,
            user_repository,
            log_codes,
        }
    }

    /// Issue a one-time code for `phone`
    pub async fn request_code(&self, phone: &str) -> AuthResult<()> {
        let phone = phone.trim();
        let code = self.otp_service.generate(phone).await?;

        if self.log_codes {
            info!("DEV one-time code for {}: {}", phone, code);
        }
        Ok(())
    }

    /// Verify a submitted code and mint a session token for the phone's user,
    /// creating the user on first login.
    pub async fn verify_code(&self, phone: &str, code: &str) -> AuthResult<String> {
        let phone = phone.trim();
        let code = code.trim();
        if phone.is_empty() || code.is_empty() {
            return Err(AuthError::Validation(
                "phone and code required".to_string(),
            ));
        }

        let verified = match self.otp_service.verify(phone, code).await {
            Ok(verified) => verified,
            Err(e) => {
                error!("Code verification failed for {}: {}", phone, e);
                false
            }
        };
        if !verified {
            warn!("Invalid code submitted for {}", phone);
            return Err(AuthError::InvalidCode);
        }

        let user = self
            .user_repository
            .get_or_create_by_phone(phone)
            .await
            .map_err(|e| {
                error!("Failed to resolve user for {}: {}", phone, e);
                AuthError::Internal("failed to resolve user".to_string())
            })?;

        let token = self.jwt_service.generate(user.id)?;
        info!("Session issued for user {}", user.id);
        Ok(token)
    }
}
