//! Middleware for session validation and request limiting

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    jwt::JwtService,
    state::AppState,
};

/// Identity of the caller on a request that passed the session gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
}

/// Extract the bearer credential from the Authorization header.
///
/// The `Bearer ` prefix is optional; surrounding whitespace is ignored.
fn bearer_token(headers: &HeaderMap) -> AuthResult<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::Unauthorized)?
        .to_str()
        .map_err(|_| AuthError::Unauthorized)?;

    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        return Err(AuthError::Unauthorized);
    }
    Ok(token)
}

/// Resolve the caller's identity from the request headers
pub fn authenticate(jwt_service: &JwtService, headers: &HeaderMap) -> AuthResult<CurrentUser> {
    let token = bearer_token(headers)?;
    let claims = jwt_service.parse(token)?;
    let id = Uuid::parse_str(&claims.uid).map_err(|_| AuthError::InvalidToken)?;
    Ok(CurrentUser { id })
}

/// Reject requests without a valid session and expose [`CurrentUser`] to
/// downstream handlers through the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    // Every failure looks the same to the client.
    let user = authenticate(&state.jwt_service, req.headers()).map_err(|e| {
        warn!("Rejected request to {}: {}", req.uri().path(), e);
        AuthError::Unauthorized
    })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Apply the global per-client request limit
pub async fn request_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !state.rate_limiter.is_allowed(&client).await {
        return Err(AuthError::RateLimitExceeded);
    }
    Ok(next.run(req).await)
}
