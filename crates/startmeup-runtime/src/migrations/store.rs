use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use sqlx::{ConnectOptions, Connection, Executor, PgPool, Postgres, Row, Transaction};
use startmeup_core::MigrationError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Boxed future returned by [`MigrationStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, MigrationError>> + Send + 'a>>;

/// One row of the tracking table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub id: i32,
    pub migration_name: String,
    pub applied_at: DateTime<Utc>,
}

/// Where applied migrations are tracked and how a migration is applied atomically.
pub trait MigrationStore: Send + Sync {
    /// Table the records live in.
    fn table(&self) -> &str;

    /// Create the tracking table if it is absent.
    fn ensure_table(&self) -> StoreFuture<'_, ()>;

    /// Applied records in application order. Creates the table first.
    fn list_records(&self) -> StoreFuture<'_, Vec<MigrationRecord>>;

    /// Run `body` and record `name` in one transaction; neither persists
    /// without the other.
    ///
    /// Cancellation is honored until the commit is sent. Once it is, the
    /// outcome is reported as a commit result, never as cancelled.
    fn apply<'a>(
        &'a self,
        name: &'a str,
        body: &'a str,
        cancel: &'a CancellationToken,
    ) -> StoreFuture<'a, ()>;
}

/// Tracking table stored in Postgres.
#[derive(Clone)]
pub struct PgMigrationStore {
    pool: PgPool,
    table: String,
}

impl PgMigrationStore {
    /// `table` is interpolated into SQL, so only plain identifiers are accepted.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self, MigrationError> {
        let table = table.into();
        if !is_plain_identifier(&table) {
            return Err(MigrationError::InvalidTableName(table));
        }
        Ok(Self { pool, table })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn create_table_sql(&self) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                migration_name TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table
        )
    }

    /// Insert the record for `name` inside the caller's transaction.
    pub async fn record(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<(), MigrationError> {
        let sql = format!("INSERT INTO {} (migration_name) VALUES ($1)", self.table);
        sqlx::query(&sql)
            .bind(name)
            .execute(&mut **tx)
            .await
            .map_err(|e| MigrationError::storage(format!("recording migration {}", name), e))?;
        Ok(())
    }

    async fn apply_in_transaction(
        &self,
        name: &str,
        body: &str,
        cancel: &CancellationToken,
    ) -> Result<(), MigrationError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            MigrationError::storage(format!("starting transaction for migration {}", name), e)
        })?;

        let (pid,): (i32,) = sqlx::query_as("SELECT pg_backend_pid()")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                MigrationError::storage(format!("reading backend pid for migration {}", name), e)
            })?;

        // Multi-statement bodies need the simple query protocol.
        let executed = {
            let conn: &mut sqlx::PgConnection = &mut tx;
            let execution = conn.execute(sqlx::raw_sql(body));
            tokio::pin!(execution);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = &mut execution => Some(result),
            };

            match outcome {
                Some(result) => Some(result),
                None => {
                    // Stop the statement server-side, then wait for the
                    // connection to report the cancellation.
                    if let Err(e) = self.cancel_backend(pid).await {
                        warn!("Could not cancel migration {} on backend {}: {}", name, pid, e);
                    } else if let Err(e) = execution.await {
                        debug!("Migration {} stopped: {}", name, e);
                    }
                    None
                }
            }
        };

        let executed = match executed {
            Some(result) => result,
            None => {
                rollback(tx, name).await;
                return Err(cancelled(name));
            }
        };

        if let Err(source) = executed {
            rollback(tx, name).await;
            return Err(MigrationError::Execution {
                name: name.to_string(),
                source,
            });
        }

        // The body may have dropped or recreated the tracking table.
        let guard = self.create_table_sql();
        sqlx::query(&guard).execute(&mut *tx).await.map_err(|e| {
            MigrationError::storage(
                format!("recreating {} after migration {}", self.table, name),
                e,
            )
        })?;

        self.record(&mut tx, name).await?;

        if cancel.is_cancelled() {
            rollback(tx, name).await;
            return Err(cancelled(name));
        }

        tx.commit().await.map_err(|source| MigrationError::Commit {
            name: name.to_string(),
            source,
        })
    }

    /// Ask the server to cancel whatever `pid` is running. Uses its own
    /// session so a fully checked-out pool cannot block it.
    async fn cancel_backend(&self, pid: i32) -> Result<bool, sqlx::Error> {
        let options = self.pool.connect_options();
        let mut conn = options.connect().await?;

        let (signalled,): (bool,) = sqlx::query_as("SELECT pg_cancel_backend($1)")
            .bind(pid)
            .fetch_one(&mut conn)
            .await?;

        if let Err(e) = conn.close().await {
            debug!("Closing cancel session failed: {}", e);
        }
        Ok(signalled)
    }
}

async fn rollback(tx: Transaction<'_, Postgres>, name: &str) {
    if let Err(e) = tx.rollback().await {
        warn!("Rollback of migration {} failed: {}", name, e);
    }
}

fn cancelled(name: &str) -> MigrationError {
    MigrationError::Cancelled {
        name: Some(name.to_string()),
    }
}

impl MigrationStore for PgMigrationStore {
    fn table(&self) -> &str {
        &self.table
    }

    fn ensure_table(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let sql = self.create_table_sql();
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| MigrationError::storage(format!("creating {}", self.table), e))?;
            Ok(())
        })
    }

    fn list_records(&self) -> StoreFuture<'_, Vec<MigrationRecord>> {
        Box::pin(async move {
            self.ensure_table().await?;

            let sql = format!(
                "SELECT id, migration_name, applied_at FROM {} ORDER BY id",
                self.table
            );
            let rows = sqlx::query(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| MigrationError::storage(format!("querying {}", self.table), e))?;

            rows.iter()
                .map(|row| {
                    Ok(MigrationRecord {
                        id: row.try_get("id")?,
                        migration_name: row.try_get("migration_name")?,
                        applied_at: row.try_get("applied_at")?,
                    })
                })
                .collect::<Result<Vec<_>, sqlx::Error>>()
                .map_err(|e| MigrationError::storage(format!("scanning {}", self.table), e))
        })
    }

    fn apply<'a>(
        &'a self,
        name: &'a str,
        body: &'a str,
        cancel: &'a CancellationToken,
    ) -> StoreFuture<'a, ()> {
        Box::pin(self.apply_in_transaction(name, body, cancel))
    }
}

/// Letters, digits and underscores, optionally schema-qualified once.
fn is_plain_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifiers() {
        assert!(is_plain_identifier("river_migrations"));
        assert!(is_plain_identifier("public.river_migrations"));
        assert!(is_plain_identifier("_m2"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("2fast"));
        assert!(!is_plain_identifier("a.b.c"));
        assert!(!is_plain_identifier("migrations; DROP TABLE users"));
        assert!(!is_plain_identifier("\"quoted\""));
    }

    #[tokio::test]
    async fn test_store_rejects_unsafe_table_name() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();

        let err = PgMigrationStore::new(pool, "bad name").err().unwrap();
        assert!(matches!(err, MigrationError::InvalidTableName(name) if name == "bad name"));
    }

    #[tokio::test]
    async fn test_create_table_sql_uses_table() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let store = PgMigrationStore::new(pool, "river_migrations").unwrap();

        let sql = store.create_table_sql();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS river_migrations"));
        assert!(sql.contains("migration_name TEXT NOT NULL"));
        assert_eq!(store.table(), "river_migrations");
    }
}
