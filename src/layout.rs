//! On-disk layout
//!
//! ```text
//! {data_dir}/{db}/{blob}/...
//! ```
//!
//! Every store resolves its artifacts relative to the blob directory returned
//! by [`BlobId::dir`].

use std::fmt;
use std::path::{Path, PathBuf};

use crate::disk::TMP_SUFFIX;
use crate::error::{Result, ShelfError};

/// Address of a blob: database name + blob name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId {
    db: String,
    blob: String,
}

impl BlobId {
    /// Build a blob address, rejecting names that are not plain path segments
    pub fn new(db: impl Into<String>, blob: impl Into<String>) -> Result<Self> {
        let db = db.into();
        let blob = blob.into();
        validate_name(&db)?;
        validate_name(&blob)?;
        Ok(Self { db, blob })
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    pub fn blob(&self) -> &str {
        &self.blob
    }

    /// Blob directory under the data root
    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(&self.db).join(&self.blob)
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.db, self.blob)
    }
}

/// Database and blob names become directory names
///
/// Names ending in the scratch suffix are refused: directory listings skip
/// them.
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.ends_with(TMP_SUFFIX)
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if bad {
        return Err(ShelfError::InvalidName(name.to_string()));
    }
    Ok(())
}
