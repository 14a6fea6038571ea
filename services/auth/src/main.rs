use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod jwt;
mod login;
mod middleware;
mod models;
mod otp;
mod rate_limiter;
mod repositories;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use common::{
    cache::{ExpiringStore, RedisConfig, RedisPool},
    database::{self, DatabaseConfig},
    error::DatabaseError,
};
use tokio::net::TcpListener;

use crate::{
    config::AppConfig,
    jwt::{JwtConfig, JwtService},
    login::LoginFlow,
    otp::OtpService,
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::{PgUserRepository, UserRepository},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Env files may set RUST_LOG
    let env_file = config::load_dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");
    match env_file {
        Some(path) => info!("Loaded environment from {}", path.display()),
        None => info!("No .env or sample.env found, using system environment"),
    }

    let app_config = AppConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;
    if !database::health_check(&pool).await? {
        anyhow::bail!("Failed to connect to database");
    }
    info!("Database connection successful");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    info!("Database migrations applied");

    // Initialize Redis; an unreachable store is fatal
    let redis_config = RedisConfig::from_env()?;
    let store: Arc<dyn ExpiringStore> = Arc::new(
        RedisPool::new(&redis_config)
            .await
            .context("Failed to connect to Redis")?,
    );

    // Initialize JWT service
    let jwt_config = JwtConfig::from_env()?;
    let jwt_service = JwtService::new(jwt_config)?;
    info!(
        "Session lifetime set to {} minutes",
        jwt_service.session_lifetime()
    );

    let otp_service = OtpService::new(store, app_config.otp.clone());
    let user_repository: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool));
    let rate_limiter =
        RateLimiter::new(RateLimiterConfig::per_minute(app_config.rate_limit_per_minute));
    info!(
        "Global request limit: {} per {:?}",
        rate_limiter.config().max_requests,
        rate_limiter.config().window
    );

    let login_flow = LoginFlow::new(
        otp_service,
        jwt_service.clone(),
        user_repository.clone(),
        app_config.is_development(),
    );

    let app_state = AppState {
        login_flow,
        jwt_service,
        user_repository,
        rate_limiter,
    };

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Authentication service listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
