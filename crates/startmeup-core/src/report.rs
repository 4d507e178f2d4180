//! Reporting capability handed to the migration manager, the enqueuer and the
//! worker instead of a process-wide logger.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Something worth telling an operator about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    MigrationsDiscovered { table: String, pending: usize },
    MigrationStarted { name: String },
    MigrationApplied { name: String, elapsed: Duration },
    MigrationFailed { name: String, error: String },
    JobInserted {
        id: Uuid,
        kind: String,
        scheduled_at: DateTime<Utc>,
    },
    HandlerRegistered { kind: String },
    WorkerStarted { kinds: Vec<String> },
    WorkerStopped,
}

/// Sink for [`Event`]s.
pub trait Reporter: Send + Sync {
    fn report(&self, event: Event);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: Event) {
        match event {
            Event::MigrationsDiscovered { table, pending } => {
                tracing::debug!(table = %table, pending, "Discovered migrations")
            }
            Event::MigrationStarted { name } => tracing::info!("Applying migration: {}", name),
            Event::MigrationApplied { name, elapsed } => {
                tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "Migration applied: {}", name)
            }
            Event::MigrationFailed { name, error } => {
                tracing::error!(error = %error, "Migration failed: {}", name)
            }
            Event::JobInserted {
                id,
                kind,
                scheduled_at,
            } => tracing::info!(job_id = %id, kind = %kind, scheduled_at = %scheduled_at, "Job inserted"),
            Event::HandlerRegistered { kind } => {
                tracing::debug!(kind = %kind, "Registered job handler")
            }
            Event::WorkerStarted { kinds } => tracing::info!(kinds = ?kinds, "Worker started"),
            Event::WorkerStopped => tracing::info!("Worker stopped"),
        }
    }
}

/// Keeps every event in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Names of migrations reported as applied, in order.
    pub fn applied_migrations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::MigrationApplied { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reporter_keeps_order() {
        let reporter = MemoryReporter::new();
        let shared: Arc<dyn Reporter> = Arc::new(reporter.clone());

        shared.report(Event::MigrationStarted { name: "001_a".into() });
        shared.report(Event::MigrationApplied {
            name: "001_a".into(),
            elapsed: Duration::from_millis(3),
        });
        shared.report(Event::WorkerStopped);

        assert_eq!(reporter.events().len(), 3);
        assert_eq!(reporter.applied_migrations(), vec!["001_a".to_string()]);
    }

    #[test]
    fn test_tracing_reporter_accepts_every_event() {
        let reporter = TracingReporter;
        reporter.report(Event::MigrationFailed {
            name: "001_a".into(),
            error: "boom".into(),
        });
        reporter.report(Event::WorkerStarted {
            kinds: vec!["example_task".into()],
        });
    }
}
