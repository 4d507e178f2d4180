use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::JobPayloadError;

/// Typed arguments for one kind of job.
///
/// The kind selects the handler on the consuming side. Bump `VERSION` when the
/// argument shape changes so consumers reject payloads they cannot read.
pub trait JobArgs: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Kind tag written to the queue row.
    const KIND: &'static str;

    /// Payload version written alongside the arguments.
    const VERSION: u32 = 1;
}

/// Versioned envelope stored in the `args` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload<A> {
    pub version: u32,
    pub args: A,
}

impl<A: JobArgs> JobPayload<A> {
    pub fn new(args: A) -> Self {
        Self {
            version: A::VERSION,
            args,
        }
    }

    /// Decode a stored payload, rejecting versions other than `A::VERSION`.
    pub fn decode(value: serde_json::Value) -> Result<A, JobPayloadError> {
        let payload: JobPayload<A> =
            serde_json::from_value(value).map_err(|source| JobPayloadError::Malformed {
                kind: A::KIND,
                source,
            })?;

        if payload.version != A::VERSION {
            return Err(JobPayloadError::UnsupportedVersion {
                kind: A::KIND,
                found: payload.version,
                expected: A::VERSION,
            });
        }
        Ok(payload.args)
    }
}

/// Single-field argument shape shared by message-carrying jobs.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MessageArgs<'a> {
    pub message: &'a str,
}

/// The example task: logs a message once it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleTask {
    pub message: String,
}

impl JobArgs for ExampleTask {
    const KIND: &'static str = "example_task";
}
