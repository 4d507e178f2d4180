use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use startmeup_core::job::JobArgs;
use startmeup_core::{Event, Reporter, Result, StartmeupError, TracingReporter};

use super::registry::JobRegistry;

/// Job worker.
///
/// Holds the registered handlers and reports its lifecycle. Dequeuing from
/// the job table belongs to the external queue runtime, which hands payloads
/// to [`Worker::process`].
pub struct Worker {
    registry: JobRegistry,
    reporter: Arc<dyn Reporter>,
    running: AtomicBool,
}

impl Worker {
    pub fn new(registry: JobRegistry) -> Self {
        Self {
            registry,
            reporter: Arc::new(TracingReporter),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Register the handler for `A::KIND`.
    pub fn register<A, F, Fut>(&mut self, handler: F)
    where
        A: JobArgs,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.registry.register(handler);
        self.reporter.report(Event::HandlerRegistered {
            kind: A::KIND.to_string(),
        });
    }

    pub fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            self.reporter.report(Event::WorkerStarted {
                kinds: self.registry.kinds(),
            });
        }
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.reporter.report(Event::WorkerStopped);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the handler for one job payload.
    pub async fn process(&self, kind: &str, args: Value) -> Result<()> {
        let handler = self
            .registry
            .get(kind)
            .ok_or_else(|| StartmeupError::Job(format!("no handler registered for {}", kind)))?;
        handler(args).await
    }
}
