pub mod builtin;
mod lock;
mod manager;
mod source;
mod store;

pub use lock::{lock_key, MigrationLock};
pub use manager::{pending_names, MigrationManager, MigrationStatus};
pub use source::{MigrationFileSource, MIGRATION_EXTENSION};
pub use store::{MigrationRecord, MigrationStore, PgMigrationStore, StoreFuture};
