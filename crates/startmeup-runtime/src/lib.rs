pub mod container;
pub mod db;
pub mod jobs;
pub mod migrations;

pub use container::Container;
pub use db::Database;
pub use jobs::{JobEnqueuer, JobRegistry, NewJob, Worker};
pub use migrations::{MigrationFileSource, MigrationLock, MigrationManager, PgMigrationStore};
