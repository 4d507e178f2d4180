//! Discovery, diffing and transactional application of migrations.
//!
//! Migrations are applied one at a time in lexicographic name order. Each one
//! runs in its own transaction together with its tracking record, and the run
//! stops at the first failure.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;
use startmeup_core::config::TasksConfig;
use startmeup_core::{Event, MigrationError, Reporter, TracingReporter};
use tokio_util::sync::CancellationToken;

use super::source::MigrationFileSource;
use super::store::{MigrationRecord, MigrationStore, PgMigrationStore};

/// Applied records and pending names, for display.
#[derive(Debug, Clone, Default)]
pub struct MigrationStatus {
    pub applied: Vec<MigrationRecord>,
    pub pending: Vec<String>,
}

/// Applies versioned SQL migrations from a directory.
pub struct MigrationManager<S = PgMigrationStore> {
    store: S,
    source: MigrationFileSource,
    reporter: Arc<dyn Reporter>,
}

impl MigrationManager<PgMigrationStore> {
    /// Manager backed by Postgres, tracking into `table`.
    pub fn new(
        pool: PgPool,
        dir: impl Into<PathBuf>,
        table: impl Into<String>,
    ) -> Result<Self, MigrationError> {
        let store = PgMigrationStore::new(pool, table)?;
        Ok(Self::with_store(store, MigrationFileSource::new(dir)))
    }

    /// Manager for the job-queue migrations.
    pub fn for_job_queue(pool: PgPool, tasks: &TasksConfig) -> Result<Self, MigrationError> {
        Self::new(pool, tasks.migrations_dir.clone(), tasks.migrations_table.clone())
    }
}

impl<S: MigrationStore> MigrationManager<S> {
    pub fn with_store(store: S, source: MigrationFileSource) -> Self {
        Self {
            store,
            source,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn source(&self) -> &MigrationFileSource {
        &self.source
    }

    /// Applied migration names in application order.
    pub async fn applied(&self) -> Result<Vec<String>, MigrationError> {
        let records = self.store.list_records().await?;
        Ok(records.into_iter().map(|r| r.migration_name).collect())
    }

    /// Discovered migrations without a record, sorted ascending.
    pub async fn pending(&self) -> Result<Vec<String>, MigrationError> {
        let applied = self.applied().await?;
        let available = self.source.list_names()?;
        Ok(pending_names(available, &applied))
    }

    /// Applied records and pending names.
    pub async fn status(&self) -> Result<MigrationStatus, MigrationError> {
        let applied = self.store.list_records().await?;
        let names: Vec<String> = applied.iter().map(|r| r.migration_name.clone()).collect();
        let pending = pending_names(self.source.list_names()?, &names);
        Ok(MigrationStatus { applied, pending })
    }

    /// Apply a single migration in its own transaction.
    ///
    /// Cancellation stops the in-flight statement and rolls the transaction
    /// back. It has no effect once the commit has been sent.
    pub async fn apply_one(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), MigrationError> {
        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled {
                name: Some(name.to_string()),
            });
        }

        let body = self.source.read_body(name)?;

        self.reporter.report(Event::MigrationStarted {
            name: name.to_string(),
        });
        let start = Instant::now();

        let result = self.store.apply(name, &body, cancel).await;

        match &result {
            Ok(()) => self.reporter.report(Event::MigrationApplied {
                name: name.to_string(),
                elapsed: start.elapsed(),
            }),
            Err(e) => self.reporter.report(Event::MigrationFailed {
                name: name.to_string(),
                error: e.to_string(),
            }),
        }
        result
    }

    /// Apply every pending migration in order, stopping at the first failure.
    ///
    /// Returns the names applied by this call.
    pub async fn apply_pending(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, MigrationError> {
        let pending = self.pending().await?;
        self.apply_sequence(pending, cancel).await
    }

    /// Apply every discovered migration, ignoring the tracking table.
    ///
    /// Migrations are not required to be idempotent, so replaying one can fail
    /// or duplicate data. Each successful replay adds another record.
    pub async fn apply_all(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, MigrationError> {
        self.store.ensure_table().await?;
        let names = self.source.list_names()?;
        self.apply_sequence(names, cancel).await
    }

    async fn apply_sequence(
        &self,
        mut names: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, MigrationError> {
        names.sort();
        self.reporter.report(Event::MigrationsDiscovered {
            table: self.store.table().to_string(),
            pending: names.len(),
        });

        let mut applied = Vec::with_capacity(names.len());
        for name in names {
            self.apply_one(&name, cancel).await?;
            applied.push(name);
        }
        Ok(applied)
    }
}

/// `available` minus `applied`, sorted ascending.
pub fn pending_names(available: Vec<String>, applied: &[String]) -> Vec<String> {
    let applied: HashSet<&str> = applied.iter().map(String::as_str).collect();
    let mut pending: Vec<String> = available
        .into_iter()
        .filter(|name| !applied.contains(name.as_str()))
        .collect();
    pending.sort();
    pending.dedup();
    pending
}
