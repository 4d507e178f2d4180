use std::io;
use std::path::{Path, PathBuf};

use startmeup_core::MigrationError;
use tracing::debug;

/// Extension recognized as a migration file.
pub const MIGRATION_EXTENSION: &str = "sql";

/// Migration files in one directory, not recursing into subdirectories.
///
/// Files should be named with a sortable prefix:
/// - `0001_create_users.sql`
/// - `0002_add_posts.sql`
#[derive(Debug, Clone)]
pub struct MigrationFileSource {
    dir: PathBuf,
}

impl MigrationFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding migration `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, MIGRATION_EXTENSION))
    }

    /// Names of every migration file, sorted. A missing directory yields none.
    pub fn list_names(&self) -> Result<Vec<String>, MigrationError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Migrations directory does not exist: {:?}", self.dir);
                return Ok(Vec::new());
            }
            Err(source) => return Err(self.discovery_error(&self.dir, source)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| self.discovery_error(&self.dir, e))?;
            let path = entry.path();

            if path.extension().map(|e| e != MIGRATION_EXTENSION).unwrap_or(true) {
                continue;
            }
            let file_type = entry.file_type().map_err(|e| self.discovery_error(&path, e))?;
            if file_type.is_dir() {
                continue;
            }

            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| {
                    self.discovery_error(
                        &path,
                        io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
                    )
                })?
                .to_string();
            names.push(name);
        }

        names.sort();
        debug!("Found {} migration files in {:?}", names.len(), self.dir);
        Ok(names)
    }

    /// Full contents of migration `name`.
    pub fn read_body(&self, name: &str) -> Result<String, MigrationError> {
        let path = self.path_for(name);
        std::fs::read_to_string(&path).map_err(|e| self.discovery_error(&path, e))
    }

    fn discovery_error(&self, path: &Path, source: io::Error) -> MigrationError {
        MigrationError::Discovery {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_list_names_from_empty_dir() {
        let dir = TempDir::new().unwrap();
        let source = MigrationFileSource::new(dir.path());
        assert!(source.list_names().unwrap().is_empty());
    }

    #[test]
    fn test_list_names_from_nonexistent_dir() {
        let source = MigrationFileSource::new("/nonexistent/migrations/river");
        assert!(source.list_names().unwrap().is_empty());
    }

    #[test]
    fn test_list_names_sorted_and_stripped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("010_c.sql"), "SELECT 3;").unwrap();
        fs::write(dir.path().join("001_a.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("002_b.sql"), "SELECT 2;").unwrap();

        let names = MigrationFileSource::new(dir.path()).list_names().unwrap();
        assert_eq!(names, vec!["001_a", "002_b", "010_c"]);
    }

    #[test]
    fn test_list_names_ignores_other_files_and_subdirectories() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("0001_migration.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("readme.txt"), "Not a migration").unwrap();
        fs::write(dir.path().join("backup.sql.bak"), "Backup").unwrap();
        fs::create_dir(dir.path().join("nested.sql")).unwrap();
        fs::create_dir(dir.path().join("archive")).unwrap();
        fs::write(dir.path().join("archive").join("0000_old.sql"), "SELECT 0;").unwrap();

        let names = MigrationFileSource::new(dir.path()).list_names().unwrap();
        assert_eq!(names, vec!["0001_migration"]);
    }

    #[test]
    fn test_read_body() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("001_init.sql"), "CREATE TABLE t (id INT);").unwrap();

        let source = MigrationFileSource::new(dir.path());
        assert_eq!(source.read_body("001_init").unwrap(), "CREATE TABLE t (id INT);");
    }

    #[test]
    fn test_read_missing_body_is_discovery_error() {
        let dir = TempDir::new().unwrap();
        let source = MigrationFileSource::new(dir.path());

        match source.read_body("404_missing") {
            Err(MigrationError::Discovery { path, source }) => {
                assert!(path.ends_with("404_missing.sql"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected discovery error, got {:?}", other),
        }
    }
}
