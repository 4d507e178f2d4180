mod enqueuer;
mod registry;
mod worker;

pub use enqueuer::{JobEnqueuer, NewJob, AVAILABLE_STATE, DEFAULT_QUEUE, JOB_TABLE};
pub use registry::{BoxedJobHandler, JobRegistry};
pub use worker::Worker;
