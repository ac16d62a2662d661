//! Test utilities for Strata crates.

use std::path::Path;
use tempfile::TempDir;

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// SQLite DSN for a database file named `name` under `dir`, created on first connect.
pub fn sqlite_dsn(dir: &Path, name: &str) -> String {
    format!("sqlite://{}?mode=rwc", dir.join(format!("{name}.db")).display())
}

/// A temporary directory holding any number of SQLite database files.
pub struct SqliteFixture {
    dir: TempDir,
}

impl SqliteFixture {
    pub fn new() -> Self {
        Self { dir: temp_dir() }
    }

    /// DSN for the database file `name` inside this fixture.
    pub fn dsn(&self, name: &str) -> String {
        sqlite_dsn(self.dir.path(), name)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for SqliteFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
        assert!(dir.path().is_dir());
    }

    #[test]
    fn test_sqlite_fixture_dsns_are_distinct() {
        let fixture = SqliteFixture::new();
        let primary = fixture.dsn("primary");
        let replica = fixture.dsn("replica");

        assert!(primary.starts_with("sqlite://"));
        assert!(primary.ends_with("primary.db?mode=rwc"));
        assert_ne!(primary, replica);
        assert!(fixture.path().exists());
    }

    proptest! {
        #[test]
        fn test_sqlite_dsn_names_file(name in "[a-z_]{1,16}") {
            let dir = temp_dir();
            let dsn = sqlite_dsn(dir.path(), &name);
            let expected_suffix = format!("{}.db?mode=rwc", name);
            prop_assert!(dsn.ends_with(&expected_suffix));
        }
    }
}
