use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use startmeup_core::config::{AppConfig, DatabaseConfig};
use startmeup_core::error::{Result, StartmeupError};

/// Database connection wrapper providing connection pooling.
///
/// The pool is shared process-wide; every component takes a clone.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect using the connection string of the configured environment.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let url = config.connection_url()?;
        Self::connect(url, &config.database).await
    }

    /// Connect to an explicit URL with the pool settings from `config`.
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| StartmeupError::Database(format!("Failed to connect: {}", e)))?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
