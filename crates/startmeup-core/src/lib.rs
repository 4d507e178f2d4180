pub mod config;
pub mod error;
pub mod job;
pub mod report;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::AppConfig;
pub use error::{EnqueueError, JobPayloadError, MigrationError, Result, StartmeupError};
pub use job::{ExampleTask, JobArgs, JobPayload};
pub use report::{Event, MemoryReporter, Reporter, TracingReporter};
