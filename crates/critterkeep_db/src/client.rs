//! Database client for Critterkeep
//!
//! A thin wrapper around an `sqlx::Any` pool. The schema is SQLite DDL, so
//! SQLite is the only driver compiled in.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use critterkeep_config::{AppConfig, DatabaseConfig};
use sqlx::any::AnyConnectOptions;
use sqlx::pool::PoolOptions;
use sqlx::{Pool, Transaction};
use tracing::{debug, error, info};

use crate::error::DbError;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub type DbTransaction<'a> = Transaction<'a, sqlx::Any>;

/// Shared handle to the connection pool. Clones share the pool.
#[derive(Debug, Clone)]
pub struct DbClient {
    pool: Pool<sqlx::Any>,
}

impl DbClient {
    /// Connect using the `[database]` section of the application config.
    pub async fn from_app_config(config: &AppConfig) -> Result<Self, DbError> {
        let db_config = config
            .database
            .as_ref()
            .ok_or_else(|| DbError::ConfigError("missing [database] section".to_string()))?;
        Self::from_config(db_config).await
    }

    pub async fn from_config(db_config: &DatabaseConfig) -> Result<Self, DbError> {
        if db_config.url.is_empty() {
            return Err(DbError::ConfigError("database url is empty".to_string()));
        }
        Self::from_url_with_pool_size(&db_config.url, db_config.max_connections).await
    }

    pub async fn from_url(db_url: &str) -> Result<Self, DbError> {
        Self::from_url_with_pool_size(db_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// In-memory SQLite databases live and die with their connection, so
    /// tests open them with `max_connections = 1`.
    pub async fn from_url_with_pool_size(
        db_url: &str,
        max_connections: u32,
    ) -> Result<Self, DbError> {
        if db_url.is_empty() {
            return Err(DbError::UrlError("database url is empty".to_string()));
        }

        // Registers the drivers enabled through cargo features with `Any`.
        sqlx::any::install_default_drivers();
        if let Some(path) = sqlite_file_path(db_url) {
            ensure_sqlite_file(path)?;
        }

        let options = AnyConnectOptions::from_str(db_url)
            .map_err(|e| DbError::UrlError(format!("{}: {}", db_url, e)))?;
        let pool = PoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Failed to open database pool: {}", e);
                DbError::PoolError(e.to_string())
            })?;

        info!(max_connections, "Database pool ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<sqlx::Any> {
        &self.pool
    }

    pub async fn begin(&self) -> Result<DbTransaction<'_>, DbError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))
    }

    /// Run a statement and return the number of affected rows.
    pub async fn execute(&self, query: &str) -> Result<u64, DbError> {
        sqlx::query(query)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| DbError::QueryError(e.to_string()))
    }

    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

/// File path of an on-disk SQLite URL; `None` for other drivers and `:memory:`.
fn sqlite_file_path(db_url: &str) -> Option<&str> {
    let rest = db_url.strip_prefix("sqlite:")?;
    let path = rest.strip_prefix("//").unwrap_or(rest);
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.contains(":memory:") {
        None
    } else {
        Some(path)
    }
}

// AnyConnectOptions has no create_if_missing
fn ensure_sqlite_file(path: &str) -> Result<(), DbError> {
    let path = Path::new(path);
    if path.exists() {
        return Ok(());
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| DbError::PoolError(format!("cannot create {}: {}", dir.display(), e)))?;
    }
    debug!(path = %path.display(), "Creating SQLite database file");
    std::fs::File::create(path)
        .map_err(|e| DbError::PoolError(format!("cannot create {}: {}", path.display(), e)))?;
    Ok(())
}
