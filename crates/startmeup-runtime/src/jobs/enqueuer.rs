use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use startmeup_core::job::{JobArgs, JobPayload, MessageArgs};
use startmeup_core::{EnqueueError, Event, Reporter, TracingReporter};
use uuid::Uuid;

/// Table the external worker runtime consumes.
pub const JOB_TABLE: &str = "river_jobs";

/// State of a freshly inserted job; the consumer picks it up once
/// `scheduled_at` passes.
pub const AVAILABLE_STATE: &str = "available";

/// Queue used when none is configured.
pub const DEFAULT_QUEUE: &str = "default";

/// A job row about to be inserted.
///
/// Only these columns are written; the rest keep their table defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub id: Uuid,
    pub kind: String,
    pub args: serde_json::Value,
    pub queue: String,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
}

impl NewJob {
    /// Build a row scheduled `delay` after `now`.
    pub fn build(
        kind: &str,
        args: serde_json::Value,
        queue: &str,
        delay: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, EnqueueError> {
        let scheduled_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .ok_or_else(|| EnqueueError::InvalidDelay {
                kind: kind.to_string(),
                delay,
            })?;

        Ok(Self {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            args,
            queue: queue.to_string(),
            created_at: now,
            scheduled_at,
        })
    }
}

/// Inserts jobs into the queue table.
#[derive(Clone)]
pub struct JobEnqueuer {
    pool: PgPool,
    queue: String,
    reporter: Arc<dyn Reporter>,
}

impl JobEnqueuer {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            queue: DEFAULT_QUEUE.to_string(),
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Insert a `kind` job carrying `message`, runnable after `delay`.
    ///
    /// `kind` is not checked against any registry; a kind no consumer handles
    /// is stored and never picked up.
    pub async fn insert(
        &self,
        kind: &str,
        message: &str,
        delay: Duration,
    ) -> Result<NewJob, EnqueueError> {
        let payload = JobPayload {
            version: 1,
            args: MessageArgs { message },
        };
        self.insert_payload(kind, &payload, delay).await
    }

    /// Insert a job from typed arguments.
    pub async fn insert_job<A: JobArgs>(
        &self,
        args: &A,
        delay: Duration,
    ) -> Result<NewJob, EnqueueError> {
        let payload = JobPayload {
            version: A::VERSION,
            args,
        };
        self.insert_payload(A::KIND, &payload, delay).await
    }

    async fn insert_payload<P: Serialize>(
        &self,
        kind: &str,
        payload: &P,
        delay: Duration,
    ) -> Result<NewJob, EnqueueError> {
        let args = serde_json::to_value(payload).map_err(|source| EnqueueError::Serialization {
            kind: kind.to_string(),
            source,
        })?;
        let job = NewJob::build(kind, args, &self.queue, delay, Utc::now())?;

        sqlx::query(&insert_sql())
        .bind(job.id)
        .bind(&job.kind)
        .bind(&job.args)
        .bind(job.scheduled_at)
        .bind(job.created_at)
        .bind(AVAILABLE_STATE)
        .bind(&job.queue)
        .execute(&self.pool)
        .await
        .map_err(|source| EnqueueError::Insert {
            kind: kind.to_string(),
            source,
        })?;

        self.reporter.report(Event::JobInserted {
            id: job.id,
            kind: job.kind.clone(),
            scheduled_at: job.scheduled_at,
        });
        Ok(job)
    }
}

fn insert_sql() -> String {
    format!(
        r#"
        INSERT INTO {} (
            id, kind, args, scheduled_at, created_at, updated_at, state, queue
        ) VALUES (
            $1, $2, $3, $4, $5, $5, $6, $7
        )
        "#,
        JOB_TABLE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_new_job_schedule() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let job = NewJob::build(
            "example_task",
            json!({"version": 1, "args": {"message": "hello"}}),
            DEFAULT_QUEUE,
            Duration::from_secs(5),
            now,
        )
        .unwrap();

        assert_eq!(job.kind, "example_task");
        assert_eq!(job.queue, "default");
        assert_eq!(job.created_at, now);
        assert_eq!(job.scheduled_at, now + chrono::Duration::seconds(5));
    }

    #[test]
    fn test_insert_targets_job_table() {
        let sql = insert_sql();
        assert!(sql.contains(&format!("INSERT INTO {} (", JOB_TABLE)));
        assert!(sql.contains("state, queue"));
    }

    #[test]
    fn test_zero_delay_runs_immediately() {
        let now = Utc::now();
        let job = NewJob::build("example_task", json!({}), "mailers", Duration::ZERO, now).unwrap();

        assert_eq!(job.scheduled_at, job.created_at);
        assert_eq!(job.queue, "mailers");
    }

    #[test]
    fn test_new_jobs_get_distinct_ids() {
        let now = Utc::now();
        let a = NewJob::build("k", json!({}), DEFAULT_QUEUE, Duration::ZERO, now).unwrap();
        let b = NewJob::build("k", json!({}), DEFAULT_QUEUE, Duration::ZERO, now).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_out_of_range_delay_is_rejected() {
        let err = NewJob::build(
            "example_task",
            json!({}),
            DEFAULT_QUEUE,
            Duration::from_secs(u64::MAX),
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, EnqueueError::InvalidDelay { kind, .. } if kind == "example_task"));
    }

    #[tokio::test]
    async fn test_enqueuer_defaults() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();

        assert_eq!(JobEnqueuer::new(pool.clone()).queue(), "default");
        assert_eq!(JobEnqueuer::new(pool).with_queue("mailers").queue(), "mailers");
    }
}
