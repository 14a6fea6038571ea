//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::{
        Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, ORIGIN},
    },
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    error::{AuthError, AuthResult},
    middleware::{CurrentUser, auth_middleware, request_limit_middleware},
    models::User,
    state::AppState,
};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Request for a one-time code
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub phone: String,
}

/// Request for code verification
#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub code: String,
}

/// Response for code verification
#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Query parameters for listing users
#[derive(Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl ListUsersQuery {
    /// Resolve the requested page, falling back to defaults on bad input
    fn resolve(&self) -> (i64, i64) {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.parse().ok())
            .filter(|p: &i64| *p >= 1)
            .unwrap_or(1);
        let page_size = self
            .page_size
            .as_deref()
            .and_then(|p| p.parse().ok())
            .filter(|p: &i64| (1..=MAX_PAGE_SIZE).contains(p))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        (page, page_size)
    }
}

/// Response for listing users
#[derive(Serialize)]
pub struct ListUsersResponse {
    pub data: Vec<User>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ORIGIN, CONTENT_TYPE, ACCEPT, AUTHORIZATION])
        .expose_headers([CONTENT_LENGTH])
        .max_age(Duration::from_secs(12 * 60 * 60))
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let auth = Router::new()
        .route("/login", post(login))
        .route("/otp/verify", post(verify_otp));

    let protected = Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(current_user))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth)
        .nest("/api", protected)
        .layer(from_fn_with_state(state.clone(), request_limit_middleware))
        .layer(CatchPanicLayer::new())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "otp-auth"
    }))
}

/// Request a one-time code for a phone number
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AuthResult<impl IntoResponse> {
    let Json(payload) = payload.map_err(|_| AuthError::Validation("phone required".into()))?;
    if payload.phone.trim().is_empty() {
        return Err(AuthError::Validation("phone required".into()));
    }

    info!("Code requested for {}", payload.phone.trim());
    state.login_flow.request_code(&payload.phone).await?;

    Ok(Json(json!({ "sent": true })))
}

/// Verify a one-time code and issue a session token
pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> AuthResult<impl IntoResponse> {
    let Json(payload) =
        payload.map_err(|_| AuthError::Validation("phone and code required".into()))?;

    let token = state
        .login_flow
        .verify_code(&payload.phone, &payload.code)
        .await?;

    Ok(Json(TokenResponse { token }))
}

/// List users, newest first
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListUsersQuery>,
) -> AuthResult<impl IntoResponse> {
    let (page, page_size) = query.resolve();
    info!("User {} listing users page {}", user.id, page);

    let (data, total) = state.user_repository.list(page, page_size).await?;

    Ok(Json(ListUsersResponse {
        data,
        page,
        page_size,
        total,
    }))
}

/// Return the record of the authenticated user
pub async fn current_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AuthResult<impl IntoResponse> {
    let record = state
        .user_repository
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| AuthError::NotFound("User".to_string()))?;

    Ok(Json(record))
}
