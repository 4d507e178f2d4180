//! Database provisioning for integration tests.
//!
//! Tests read `TEST_DATABASE_URL`, never `DATABASE_URL`, and work inside a
//! freshly created database so they cannot touch each other's tables.

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::{Result, StartmeupError};

/// Variable naming the server integration tests connect to.
pub const TEST_DATABASE_URL: &str = "TEST_DATABASE_URL";

/// Connection to the server used by integration tests.
pub struct TestDatabase {
    pool: PgPool,
    url: String,
}

impl TestDatabase {
    /// Connect to database at the given URL.
    pub async fn from_url(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(url)
            .await
            .map_err(StartmeupError::Sql)?;

        Ok(Self {
            pool,
            url: url.to_string(),
        })
    }

    /// Connect using `TEST_DATABASE_URL`, or `None` when it is not set.
    pub async fn from_env() -> Result<Option<Self>> {
        match std::env::var(TEST_DATABASE_URL) {
            Ok(url) if !url.is_empty() => Self::from_url(&url).await.map(Some),
            _ => Ok(None),
        }
    }

    /// Create a dedicated database for one test.
    pub async fn isolated(&self, test_name: &str) -> Result<IsolatedTestDb> {
        let db_name = format!(
            "startmeup_test_{}_{}",
            sanitize_db_name(test_name),
            uuid::Uuid::new_v4().simple()
        );

        sqlx::query(&format!("CREATE DATABASE \"{}\"", db_name))
            .execute(&self.pool)
            .await
            .map_err(StartmeupError::Sql)?;

        let url = replace_db_name(&self.url, &db_name);
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(StartmeupError::Sql)?;

        Ok(IsolatedTestDb {
            pool,
            url,
            db_name,
            admin: self.pool.clone(),
        })
    }
}

/// A database that lives for a single test.
pub struct IsolatedTestDb {
    pool: PgPool,
    url: String,
    db_name: String,
    admin: PgPool,
}

impl IsolatedTestDb {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Drop the database.
    pub async fn cleanup(self) -> Result<()> {
        self.pool.close().await;

        sqlx::query(&format!(
            "DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)",
            self.db_name
        ))
        .execute(&self.admin)
        .await
        .map_err(StartmeupError::Sql)?;

        Ok(())
    }
}

fn sanitize_db_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .take(24)
        .collect()
}

/// Replace the database name in a connection URL, keeping query parameters.
fn replace_db_name(url: &str, new_db: &str) -> String {
    let (base, query) = match url.find('?') {
        Some(idx) => url.split_at(idx),
        None => (url, ""),
    };

    match base.rfind('/') {
        Some(idx) if idx > base.find("//").map(|i| i + 1).unwrap_or(0) => {
            format!("{}{}{}", &base[..=idx], new_db, query)
        }
        _ => format!("{}/{}{}", base, new_db, query),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_db_name() {
        assert_eq!(sanitize_db_name("Scenario A: init"), "scenario_a__init");
        assert_eq!(sanitize_db_name(&"x".repeat(40)).len(), 24);
    }

    #[test]
    fn test_replace_db_name() {
        assert_eq!(
            replace_db_name("postgres://u:p@localhost:5432/postgres", "t1"),
            "postgres://u:p@localhost:5432/t1"
        );
        assert_eq!(
            replace_db_name("postgres://localhost/app?sslmode=disable", "t2"),
            "postgres://localhost/t2?sslmode=disable"
        );
        assert_eq!(replace_db_name("postgres://localhost", "t3"), "postgres://localhost/t3");
    }
}
