//! Test database utilities using the real DatabaseManager

use anyhow::Result;
use avenue_tools::database::DatabaseManager;
use tempfile::TempDir;

/// A database in its own temporary directory, removed on drop
pub struct TestDatabase {
    pub manager: DatabaseManager,
    _dir: TempDir,
}

impl TestDatabase {
    pub fn path_dir(&self) -> &std::path::Path {
        self._dir.path()
    }
}

/// Initialize a completely fresh test database
pub async fn init_fresh_test_database() -> Result<TestDatabase> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("test.db");
    let manager = DatabaseManager::new(&path.to_string_lossy()).await?;
    Ok(TestDatabase { manager, _dir: dir })
}
