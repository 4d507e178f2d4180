use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures raised while discovering, tracking or applying migrations.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("failed to read migrations at {}: {source}", .path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("migration storage error while {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to apply migration {name}: {source}")]
    Execution {
        name: String,
        #[source]
        source: sqlx::Error,
    },

    /// The outcome is database-dependent; verify the schema by hand.
    #[error("failed to commit migration {name}: {source}")]
    Commit {
        name: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{}", cancelled_message(.name))]
    Cancelled { name: Option<String> },

    #[error("invalid migrations table name: {0:?}")]
    InvalidTableName(String),
}

fn cancelled_message(name: &Option<String>) -> String {
    match name {
        Some(name) => format!("migration {} cancelled, transaction rolled back", name),
        None => "migration run cancelled".to_string(),
    }
}

impl MigrationError {
    pub fn storage(context: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    /// Name of the migration this error belongs to, if any.
    pub fn migration_name(&self) -> Option<&str> {
        match self {
            Self::Execution { name, .. } | Self::Commit { name, .. } => Some(name),
            Self::Cancelled { name } => name.as_deref(),
            _ => None,
        }
    }
}

/// Failures raised while inserting a job row.
#[derive(Error, Debug)]
pub enum EnqueueError {
    #[error("failed to serialize arguments for job {kind}: {source}")]
    Serialization {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to insert job {kind}: {source}")]
    Insert {
        kind: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("delay {delay:?} for job {kind} is out of range")]
    InvalidDelay { kind: String, delay: Duration },
}

/// Failures raised while decoding a stored job payload.
#[derive(Error, Debug)]
pub enum JobPayloadError {
    #[error("malformed payload for job {kind}: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("job {kind} payload version {found} is not supported (expected {expected})")]
    UnsupportedVersion {
        kind: &'static str,
        found: u32,
        expected: u32,
    },
}

/// Umbrella error for the application.
#[derive(Error, Debug)]
pub enum StartmeupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Job error: {0}")]
    Job(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Enqueue(#[from] EnqueueError),

    #[error(transparent)]
    Payload(#[from] JobPayloadError),
}

/// Result type alias using StartmeupError.
pub type Result<T> = std::result::Result<T, StartmeupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_names_migration() {
        let err = MigrationError::Execution {
            name: "001_init".into(),
            source: sqlx::Error::Protocol("syntax error at or near \"CREAT\"".into()),
        };
        assert_eq!(err.migration_name(), Some("001_init"));
        assert!(err.to_string().contains("failed to apply migration 001_init"));
    }

    #[test]
    fn test_cancelled_messages() {
        let named = MigrationError::Cancelled {
            name: Some("002_add_col".into()),
        };
        assert_eq!(
            named.to_string(),
            "migration 002_add_col cancelled, transaction rolled back"
        );

        let run = MigrationError::Cancelled { name: None };
        assert_eq!(run.to_string(), "migration run cancelled");
        assert_eq!(run.migration_name(), None);
    }

    #[test]
    fn test_migration_error_is_transparent_in_umbrella() {
        let err: StartmeupError = MigrationError::InvalidTableName("bad name".into()).into();
        assert_eq!(err.to_string(), "invalid migrations table name: \"bad name\"");
    }
}
