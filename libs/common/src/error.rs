//! Custom error types for the common library
//!
//! This module defines the typed errors raised by the shared infrastructure
//! (the expiring key-value store and the relational database).

use redis::RedisError;
use sqlx::Error as SqlxError;
use std::time::Duration;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Error type for expiring key-value store operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// The store could not be reached
    #[error("Cache connection error: {0}")]
    Connection(#[source] RedisError),

    /// A command reached the store but failed
    #[error("Cache command error: {0}")]
    Command(#[source] RedisError),

    /// A command did not complete before its deadline
    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    /// A stored value did not have the expected shape
    #[error("Unexpected value stored under key {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl From<RedisError> for CacheError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            CacheError::Connection(err)
        } else {
            CacheError::Command(err)
        }
    }
}

/// Type alias for Result with CacheError
pub type CacheResult<T> = Result<T, CacheError>;
