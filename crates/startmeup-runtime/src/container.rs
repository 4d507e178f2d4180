use std::sync::Arc;
use std::time::Duration;

use startmeup_core::config::AppConfig;
use startmeup_core::{MigrationError, Reporter, Result, TracingReporter};

use crate::db::Database;
use crate::jobs::{JobEnqueuer, JobRegistry, Worker};
use crate::migrations::MigrationManager;

/// Services shared by the entry points.
pub struct Container {
    pub config: AppConfig,
    pub database: Database,
    pub reporter: Arc<dyn Reporter>,
    pub tasks: JobEnqueuer,
    pub worker: Worker,
}

impl Container {
    /// Connect to the database for the configured environment and build the services.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let database = Database::from_config(&config).await?;
        Ok(Self::with_database(config, database, Arc::new(TracingReporter)))
    }

    pub fn with_database(config: AppConfig, database: Database, reporter: Arc<dyn Reporter>) -> Self {
        let tasks = JobEnqueuer::new(database.pool().clone())
            .with_queue(config.tasks.queue.clone())
            .with_reporter(reporter.clone());
        let worker = Worker::new(JobRegistry::new()).with_reporter(reporter.clone());

        Self {
            config,
            database,
            reporter,
            tasks,
            worker,
        }
    }

    /// Manager for the job-queue migrations.
    pub fn job_queue_migrations(&self) -> std::result::Result<MigrationManager, MigrationError> {
        Ok(
            MigrationManager::for_job_queue(self.database.pool().clone(), &self.config.tasks)?
                .with_reporter(self.reporter.clone()),
        )
    }

    /// Stop the worker and close the pool.
    pub async fn shutdown(&self) {
        self.worker.stop();

        let timeout = Duration::from_secs(self.config.tasks.shutdown_timeout_secs);
        if tokio::time::timeout(timeout, self.database.close()).await.is_err() {
            tracing::warn!("Database pool did not close within {:?}", timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use startmeup_core::{Event, ExampleTask, MemoryReporter};

    fn container(reporter: &MemoryReporter) -> Container {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let mut config = AppConfig::default();
        config.tasks.queue = "mailers".into();
        config.tasks.migrations_table = "queue_migrations".into();

        Container::with_database(config, Database::from_pool(pool), Arc::new(reporter.clone()))
    }

    #[tokio::test]
    async fn test_services_follow_config() {
        let container = container(&MemoryReporter::new());

        assert_eq!(container.tasks.queue(), "mailers");
        let manager = container.job_queue_migrations().unwrap();
        assert_eq!(manager.source().dir(), std::path::Path::new("migrations/river"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_worker_and_closes_pool() {
        let reporter = MemoryReporter::new();
        let mut container = container(&reporter);
        container.worker.register(|_: ExampleTask| async { Ok(()) });
        container.worker.start();

        container.shutdown().await;

        assert!(!container.worker.is_running());
        assert!(container.database.pool().is_closed());
        assert_eq!(reporter.events().last(), Some(&Event::WorkerStopped));
    }
}
