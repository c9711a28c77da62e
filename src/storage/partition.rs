//! Partition Router / Bucket Store
//!
//! Routes records to buckets by hashing their partition-key values and keeps,
//! per bucket, the set of pages holding that bucket's records.
//!
//! ## Hash Key
//! ```text
//! spec = [col1, col2]
//! key  = b64url(sha1(render(col1))) ++ b64url(sha1(render(col2))) ++ ".json"
//! ```
//! Each field contributes a fixed 28-character segment, so the key is
//! sensitive to field order and doubles as the bucket's file name.

use std::path::PathBuf;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::disk;
use crate::error::{Result, ShelfError};
use crate::layout::{self, BlobId};
use crate::record::{HashKey, PageId, Record};

/// Suffix appended to the concatenated digests
pub const HASH_KEY_SUFFIX: &str = ".json";

/// Ordered list of field names that decides a record's bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec {
    keys: Vec<String>,
}

impl PartitionSpec {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

/// Compute the bucket of a record
///
/// Fails with `MissingPartitionField` on the first spec field the record
/// lacks and with `InvalidValue` on a NaN or infinite float. An empty spec sends every record to the same bucket.
pub fn route_key(spec: &PartitionSpec, record: &Record) -> Result<HashKey> {
    let mut key = String::with_capacity(spec.keys.len() * 28 + HASH_KEY_SUFFIX.len());
    for field in &spec.keys {
        let value = record
            .get(field)
            .ok_or_else(|| ShelfError::MissingPartitionField(field.clone()))?;
        if !value.is_storable() {
            return Err(ShelfError::InvalidValue {
                field: field.clone(),
                value: value.to_string(),
            });
        }
        let digest = Sha1::digest(value.to_string().as_bytes());
        URL_SAFE.encode_string(digest, &mut key);
    }
    key.push_str(HASH_KEY_SUFFIX);
    Ok(key)
}

/// Manages the partition spec and the per-bucket membership files
#[derive(Debug, Clone)]
pub struct PartitionStore {
    /// Root directory of all databases
    root: PathBuf,
}

impl PartitionStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const SPEC_FILENAME: &'static str = "partitions.json";
    const BUCKET_DIR: &'static str = "partitions";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Persist the partition spec and create an empty bucket directory
    pub fn initialize(&self, blob: &BlobId, spec: &PartitionSpec) -> Result<()> {
        let dir = self.bucket_dir(blob);
        if dir.exists() {
            return Err(ShelfError::AlreadyExists(dir.display().to_string()));
        }

        disk::create_json(&self.spec_path(blob), spec)?;
        disk::create_dir(&dir)?;

        debug!(blob = %blob, keys = ?spec.keys(), "partition store initialized");
        Ok(())
    }

    /// Read back the partition spec of a blob
    pub fn spec(&self, blob: &BlobId) -> Result<PartitionSpec> {
        disk::read_json(&self.spec_path(blob))
    }

    /// Pages holding records of a bucket
    pub fn membership(&self, blob: &BlobId, hash_key: &str) -> Result<Vec<PageId>> {
        disk::read_json(&self.bucket_path(blob, hash_key)?)
    }

    /// Add a page to a bucket, creating the bucket if needed
    ///
    /// Adding a page that is already a member is a no-op.
    pub fn add_page(&self, blob: &BlobId, hash_key: &str, page_id: &str) -> Result<()> {
        let path = self.bucket_path(blob, hash_key)?;
        let mut pages: Vec<PageId> = match disk::read_json(&path) {
            Ok(pages) => pages,
            Err(e) if e.is_not_found() => {
                disk::create_json(&path, &Vec::<PageId>::new())?;
                debug!(blob = %blob, bucket = %hash_key, "bucket created");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        if pages.iter().any(|p| p == page_id) {
            return Ok(());
        }

        pages.push(page_id.to_string());
        disk::write_json(&path, &pages)?;

        debug!(blob = %blob, bucket = %hash_key, page = %page_id, "page added to bucket");
        Ok(())
    }

    /// Remove the first occurrence of a page from a bucket
    ///
    /// Fails with `NotFound` if the bucket does not exist; a page that is not
    /// a member is ignored.
    pub fn remove_page(&self, blob: &BlobId, hash_key: &str, page_id: &str) -> Result<()> {
        let path = self.bucket_path(blob, hash_key)?;
        let mut pages: Vec<PageId> = disk::read_json(&path)?;

        if let Some(pos) = pages.iter().position(|p| p == page_id) {
            pages.remove(pos);
            disk::write_json(&path, &pages)?;
            debug!(blob = %blob, bucket = %hash_key, page = %page_id, "page removed from bucket");
        }
        Ok(())
    }

    /// Remove a bucket's membership file
    pub fn delete_bucket(&self, blob: &BlobId, hash_key: &str) -> Result<()> {
        disk::delete_file(&self.bucket_path(blob, hash_key)?)?;
        debug!(blob = %blob, bucket = %hash_key, "bucket deleted");
        Ok(())
    }

    /// Hash keys of every existing bucket, sorted
    pub fn list_buckets(&self, blob: &BlobId) -> Result<Vec<HashKey>> {
        disk::list_dir(&self.bucket_dir(blob))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn spec_path(&self, blob: &BlobId) -> PathBuf {
        blob.dir(&self.root).join(Self::SPEC_FILENAME)
    }

    fn bucket_dir(&self, blob: &BlobId) -> PathBuf {
        blob.dir(&self.root).join(Self::BUCKET_DIR)
    }

    fn bucket_path(&self, blob: &BlobId, hash_key: &str) -> Result<PathBuf> {
        layout::validate_name(hash_key)?;
        Ok(self.bucket_dir(blob).join(hash_key))
    }
}
