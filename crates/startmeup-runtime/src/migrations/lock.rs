//! Session-scoped advisory lock serializing migration runners.
//!
//! The lock lives on its own connection, opened with the pool's options but
//! outside the pool, so holding it never takes a slot the migrations need.
//! `pg_advisory_unlock` runs on the same session that locked.

use sqlx::postgres::PgConnection;
use sqlx::{ConnectOptions, Connection, PgPool};
use startmeup_core::MigrationError;
use tracing::{debug, warn};

/// Stable lock key for a tracking table (FNV-1a over the name).
pub fn lock_key(table: &str) -> i64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = table
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME));
    hash as i64
}

/// Held advisory lock. Call [`MigrationLock::release`] when done.
pub struct MigrationLock {
    conn: Option<PgConnection>,
    key: i64,
}

impl MigrationLock {
    /// Block until the lock for `table` is acquired.
    pub async fn acquire(pool: &PgPool, table: &str) -> Result<Self, MigrationError> {
        let key = lock_key(table);
        let options = pool.connect_options();
        let mut conn = options
            .connect()
            .await
            .map_err(|e| MigrationError::storage("opening a session for the migration lock", e))?;

        debug!(key, "Acquiring migration lock...");
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(key)
            .execute(&mut conn)
            .await
            .map_err(|e| MigrationError::storage("acquiring the migration lock", e))?;
        debug!(key, "Migration lock acquired");

        Ok(Self {
            conn: Some(conn),
            key,
        })
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    /// Release the lock and close its session.
    pub async fn release(mut self) -> Result<(), MigrationError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .execute(&mut conn)
            .await
            .map_err(|e| MigrationError::storage("releasing the migration lock", e))?;
        debug!(key = self.key, "Migration lock released");

        if let Err(e) = conn.close().await {
            warn!(key = self.key, "Closing migration lock session failed: {}", e);
        }
        Ok(())
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        // Dropping the connection ends the session, which releases the lock.
        if self.conn.take().is_some() {
            warn!(key = self.key, "Migration lock dropped without release, closing its session");
        }
    }
}
