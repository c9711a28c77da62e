//! Blob format document
//!
//! Stored and returned verbatim; nothing in the storage layer validates
//! records against it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::disk;
use crate::error::Result;
use crate::layout::BlobId;

/// Declared type of one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFormat {
    pub key_type: String,
}

impl FieldFormat {
    pub fn new(key_type: impl Into<String>) -> Self {
        Self {
            key_type: key_type.into(),
        }
    }
}

/// Field name → declared type
pub type Format = BTreeMap<String, FieldFormat>;

/// Persists `format.json` inside a blob directory
#[derive(Debug, Clone)]
pub struct FormatStore {
    root: PathBuf,
}

impl FormatStore {
    const FORMAT_FILENAME: &'static str = "format.json";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write the format of a new blob; fails if one already exists
    pub fn create(&self, blob: &BlobId, format: &Format) -> Result<()> {
        disk::create_json(&self.format_path(blob), format)
    }

    pub fn get(&self, blob: &BlobId) -> Result<Format> {
        disk::read_json(&self.format_path(blob))
    }

    fn format_path(&self, blob: &BlobId) -> PathBuf {
        blob.dir(&self.root).join(Self::FORMAT_FILENAME)
    }
}
