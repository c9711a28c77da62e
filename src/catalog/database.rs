//! Database directories

use std::path::PathBuf;

use tracing::debug;

use crate::disk;
use crate::error::Result;
use crate::layout;

/// Creates, deletes and lists databases (top-level directories)
#[derive(Debug, Clone)]
pub struct DatabaseStore {
    root: PathBuf,
}

impl DatabaseStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn create(&self, db: &str) -> Result<()> {
        disk::create_dir(&self.db_dir(db)?)?;
        debug!(db, "database created");
        Ok(())
    }

    /// Remove a database and every blob in it
    pub fn delete(&self, db: &str) -> Result<()> {
        disk::delete_dir(&self.db_dir(db)?)?;
        debug!(db, "database deleted");
        Ok(())
    }

    /// Names of all databases, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        disk::list_dir(&self.root)
    }

    fn db_dir(&self, db: &str) -> Result<PathBuf> {
        layout::validate_name(db)?;
        Ok(self.root.join(db))
    }
}
