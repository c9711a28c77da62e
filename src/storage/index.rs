//! Index Shard Store
//!
//! Resolves record ids to the page holding them. Shards are keyed by the
//! first `prefix_len` characters of the record id; a prefix can accumulate
//! several shards (one per ingest batch), listed oldest → newest in the
//! registry.
//!
//! ```text
//! indexes.json                 indexes/
//! {                            ├── 6b1e...json  {"0a..": "p1.json", ...}
//!   "0": ["6b1e...json",       ├── 91c4...json  {"0f..": "p7.json", ...}
//!         "91c4...json"],      └── d2a0...json  {"a3..": "p2.json", ...}
//!   "a": ["d2a0...json"]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::disk;
use crate::error::{Result, ShelfError};
use crate::layout::{self, BlobId};
use crate::record::{IndexRecords, PageId, ShardId};

/// Index registry: prefix → shard ids, oldest first
pub type IndexRegistry = BTreeMap<String, Vec<ShardId>>;

/// Manages index shard files and the index registry
#[derive(Debug, Clone)]
pub struct IndexStore {
    /// Root directory of all databases
    root: PathBuf,

    /// Number of leading record-id characters forming the shard prefix
    prefix_len: usize,
}

impl IndexStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const REGISTRY_FILENAME: &'static str = "indexes.json";
    const SHARD_DIR: &'static str = "indexes";

    pub fn new(root: impl Into<PathBuf>, prefix_len: usize) -> Self {
        Self {
            root: root.into(),
            prefix_len,
        }
    }

    /// Create an empty registry and an empty shard directory
    pub fn initialize(&self, blob: &BlobId) -> Result<()> {
        let dir = self.shard_dir(blob);
        if dir.exists() {
            return Err(ShelfError::AlreadyExists(dir.display().to_string()));
        }

        disk::create_json(&self.registry_path(blob), &IndexRegistry::new())?;
        disk::create_dir(&dir)?;

        debug!(blob = %blob, "index store initialized");
        Ok(())
    }

    /// Allocate an empty shard under the prefix of `any_record_id`
    pub fn allocate(&self, blob: &BlobId, any_record_id: &str) -> Result<ShardId> {
        self.allocate_with(blob, any_record_id, &IndexRecords::new())
    }

    /// Allocate a shard that already holds `content`
    ///
    /// The shard file is complete before it is published in the registry.
    pub fn allocate_with(
        &self,
        blob: &BlobId,
        any_record_id: &str,
        content: &IndexRecords,
    ) -> Result<ShardId> {
        let shard_id = format!("{}.json", Uuid::new_v4());
        disk::create_json(&self.shard_path(blob, &shard_id)?, content)?;

        let prefix = self.prefix_of(any_record_id).to_string();
        let mut registry = self.registry(blob)?;
        registry
            .entry(prefix.clone())
            .or_default()
            .push(shard_id.clone());
        disk::write_json(&self.registry_path(blob), &registry)?;

        debug!(
            blob = %blob,
            shard = %shard_id,
            prefix = %prefix,
            entries = content.len(),
            "index shard allocated"
        );
        Ok(shard_id)
    }

    /// The whole registry
    pub fn registry(&self, blob: &BlobId) -> Result<IndexRegistry> {
        disk::read_json(&self.registry_path(blob))
    }

    /// Shards registered under `prefix`, oldest first (empty if none)
    pub fn shards_for_prefix(&self, blob: &BlobId, prefix: &str) -> Result<Vec<ShardId>> {
        Ok(self.registry(blob)?.remove(prefix).unwrap_or_default())
    }

    /// Read the mapping held by a shard
    pub fn read(&self, blob: &BlobId, shard_id: &str) -> Result<IndexRecords> {
        disk::read_json(&self.shard_path(blob, shard_id)?)
    }

    /// Replace the entire mapping held by a shard
    pub fn write(&self, blob: &BlobId, shard_id: &str, content: &IndexRecords) -> Result<()> {
        disk::write_json(&self.shard_path(blob, shard_id)?, content)?;
        debug!(blob = %blob, shard = %shard_id, entries = content.len(), "index shard written");
        Ok(())
    }

    /// Delete a shard and drop it from the registry
    ///
    /// Returns whether the shard file existed. Only the first prefix list
    /// holding the id is touched; a list left empty is removed.
    pub fn delete(&self, blob: &BlobId, shard_id: &str) -> Result<bool> {
        let existed = match disk::delete_file(&self.shard_path(blob, shard_id)?) {
            Ok(()) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e),
        };

        let mut registry = self.registry(blob)?;
        let owner = registry
            .iter()
            .find(|(_, shards)| shards.iter().any(|s| s == shard_id))
            .map(|(prefix, _)| prefix.clone());

        if let Some(prefix) = owner {
            if let Some(shards) = registry.get_mut(&prefix) {
                shards.retain(|s| s != shard_id);
                if shards.is_empty() {
                    registry.remove(&prefix);
                }
            }
            disk::write_json(&self.registry_path(blob), &registry)?;
        }

        debug!(blob = %blob, shard = %shard_id, existed, "index shard deleted");
        Ok(existed)
    }

    /// Shard prefix of a record id: its first `prefix_len` characters
    ///
    /// Ids shorter than the prefix length are their own prefix.
    pub fn prefix_of<'a>(&self, record_id: &'a str) -> &'a str {
        match record_id.char_indices().nth(self.prefix_len) {
            Some((end, _)) => &record_id[..end],
            None => record_id,
        }
    }

    /// Find the page currently holding `record_id`
    ///
    /// Every shard under the record's prefix is consulted, newest first, so a
    /// record re-ingested by a later batch resolves to its latest page.
    pub fn locate(&self, blob: &BlobId, record_id: &str) -> Result<Option<PageId>> {
        let shards = self.shards_for_prefix(blob, self.prefix_of(record_id))?;

        for shard_id in shards.iter().rev() {
            let records = match self.read(blob, shard_id) {
                Ok(records) => records,
                Err(e) if e.is_not_found() => {
                    warn!(blob = %blob, shard = %shard_id, "registered index shard is missing");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(page_id) = records.get(record_id) {
                return Ok(Some(page_id.clone()));
            }
        }

        Ok(None)
    }

    /// Fold every shard under `prefix` into a single new shard
    ///
    /// Newer shards win on conflicting record ids. The merged shard is
    /// published before the old ones are removed, so lookups never miss.
    /// Returns `None` when there is nothing to merge.
    pub fn merge_prefix(&self, blob: &BlobId, prefix: &str) -> Result<Option<ShardId>> {
        let shards = self.shards_for_prefix(blob, prefix)?;
        if shards.len() < 2 {
            return Ok(None);
        }

        let mut merged = IndexRecords::new();
        for shard_id in &shards {
            match self.read(blob, shard_id) {
                Ok(records) => merged.extend(records),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        let merged_id = self.allocate_with(blob, prefix, &merged)?;
        for shard_id in &shards {
            self.delete(blob, shard_id)?;
        }

        debug!(
            blob = %blob,
            prefix = %prefix,
            merged = shards.len(),
            shard = %merged_id,
            "index shards merged"
        );
        Ok(Some(merged_id))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn registry_path(&self, blob: &BlobId) -> PathBuf {
        blob.dir(&self.root).join(Self::REGISTRY_FILENAME)
    }

    fn shard_dir(&self, blob: &BlobId) -> PathBuf {
        blob.dir(&self.root).join(Self::SHARD_DIR)
    }

    fn shard_path(&self, blob: &BlobId, shard_id: &str) -> Result<PathBuf> {
        layout::validate_name(shard_id)?;
        Ok(self.shard_dir(blob).join(shard_id))
    }
}
