mod traits;

pub use traits::{ExampleTask, JobArgs, JobPayload, MessageArgs};
