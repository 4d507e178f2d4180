//! Job-queue schema shipped with the application.
//!
//! The same file lives in `migrations/river/` where the migration manager
//! picks it up; the embedded copy lets tests and tooling create the tables
//! without a tracking record.

use sqlx::PgPool;
use startmeup_core::MigrationError;

/// Name of the job-queue schema migration.
pub const JOB_QUEUE_SCHEMA_NAME: &str = "0001_create_river_tables";

/// Job-queue schema SQL.
pub const JOB_QUEUE_SCHEMA: &str =
    include_str!("../../../../migrations/river/0001_create_river_tables.sql");

/// Create the job-queue tables directly, without touching the tracking table.
pub async fn ensure_job_queue_schema(pool: &PgPool) -> Result<(), MigrationError> {
    sqlx::raw_sql(JOB_QUEUE_SCHEMA)
        .execute(pool)
        .await
        .map_err(|source| MigrationError::Execution {
            name: JOB_QUEUE_SCHEMA_NAME.to_string(),
            source,
        })?;
    tracing::debug!("Job queue schema ensured");
    Ok(())
}
