use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use startmeup_core::job::{JobArgs, JobPayload};
use startmeup_core::Result;

/// Type alias for boxed job handler function.
pub type BoxedJobHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// Handlers keyed by job kind.
#[derive(Clone, Default)]
pub struct JobRegistry {
    handlers: HashMap<String, BoxedJobHandler>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `A::KIND`, replacing any previous one.
    pub fn register<A, F, Fut>(&mut self, handler: F)
    where
        A: JobArgs,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let boxed: BoxedJobHandler = Arc::new(move |payload: Value| {
            let handler = handler.clone();
            Box::pin(async move {
                let args = JobPayload::<A>::decode(payload)?;
                handler(args).await
            }) as Pin<Box<dyn Future<Output = Result<()>> + Send>>
        });

        self.handlers.insert(A::KIND.to_string(), boxed);
    }

    pub fn get(&self, kind: &str) -> Option<BoxedJobHandler> {
        self.handlers.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
