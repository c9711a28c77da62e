//! Blob directories

use std::path::PathBuf;

use tracing::debug;

use crate::disk;
use crate::error::Result;
use crate::layout::{self, BlobId};

/// Creates, deletes and lists blob directories inside a database
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the blob directory; the database must exist
    pub fn create(&self, blob: &BlobId) -> Result<()> {
        disk::create_dir(&blob.dir(&self.root))?;
        debug!(blob = %blob, "blob directory created");
        Ok(())
    }

    /// Remove the blob directory and everything in it
    pub fn delete(&self, blob: &BlobId) -> Result<()> {
        disk::delete_dir(&blob.dir(&self.root))?;
        debug!(blob = %blob, "blob directory deleted");
        Ok(())
    }

    /// Names of the blobs in a database, sorted
    pub fn list(&self, db: &str) -> Result<Vec<String>> {
        layout::validate_name(db)?;
        disk::list_dir(&self.root.join(db))
    }
}
