//! Error types for the database client

use critterkeep_common::CritterError;
use thiserror::Error;

/// Errors that can occur when working with the database client
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from SQLx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Error with the database configuration
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Error with database URL parsing
    #[error("Database URL error: {0}")]
    UrlError(String),

    /// Error with database pool creation
    #[error("Database pool error: {0}")]
    PoolError(String),

    /// Error with database query
    #[error("Database query error: {0}")]
    QueryError(String),

    /// Error with database transaction
    #[error("Database transaction error: {0}")]
    TransactionError(String),

    /// Input rejected before it reached the database
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The row being written already exists
    #[error("Duplicate: {0}")]
    Duplicate(String),
}

impl From<DbError> for CritterError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidInput(msg) | DbError::Duplicate(msg) => {
                CritterError::ValidationError(msg)
            }
            DbError::ConfigError(msg) => CritterError::ConfigError(msg),
            other => CritterError::DatabaseError(other.to_string()),
        }
    }
}
