//! Common infrastructure shared by the services of the workspace
//!
//! This crate provides the expiring key-value store used for one-time codes
//! and rate-limit counters, PostgreSQL connectivity, and the typed errors
//! raised by both.
//!
//! ```rust,no_run
//! use common::cache::{ExpiringStore, RedisConfig, RedisPool};
//! use common::database::{DatabaseConfig, health_check, init_pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = init_pool(&DatabaseConfig::from_env()?).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!
//!     let redis = RedisPool::new(&RedisConfig::from_env()?).await?;
//!     println!("Redis health check: {}", redis.health_check().await?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;
