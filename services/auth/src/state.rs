//! Application state shared across handlers

use std::sync::Arc;

use crate::{
    jwt::JwtService, login::LoginFlow, rate_limiter::RateLimiter, repositories::UserRepository,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub login_flow: LoginFlow,
    pub jwt_service: JwtService,
    pub user_repository: Arc<dyn UserRepository>,
    pub rate_limiter: RateLimiter,
}
