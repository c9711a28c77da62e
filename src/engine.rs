//! Engine Module
//!
//! The explicitly constructed owner of every store.
//!
//! ## Responsibilities
//! - Build the stores once from a `Config` and hand them out by reference
//! - Serialize writers of the same blob
//! - Create blobs all-or-nothing, rolling back partial setups
//! - Route batches through the ingest coordinator
//! - Resolve record ids through the index for reads

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::catalog::{BlobStore, DatabaseStore, Format, FormatStore};
use crate::config::Config;
use crate::error::Result;
use crate::ingest::{IngestCoordinator, IngestReport};
use crate::layout::BlobId;
use crate::record::{PageId, PageRecords, Record, ShardId};
use crate::storage::{IndexStore, PageStore, PartitionSpec, PartitionStore};

/// The storage engine
///
/// ## Concurrency Model: one writer per blob
///
/// - **Writes** (create/drop blob, ingest, page/shard deletion, index merge):
///   serialized per blob by a lock taken from `blob_locks`. Entries of
///   blobs that no longer exist are pruned after each write. Every registry
///   update is read-modify-write, so two writers on one blob would lose
///   updates. Different blobs proceed in parallel.
///
/// - **Reads** (get/locate/membership): lock-free. Artifacts are replaced by
///   atomic rename, so a reader sees either the old or the new file.
pub struct Engine {
    /// Engine configuration
    config: Config,

    databases: DatabaseStore,
    blobs: BlobStore,
    formats: FormatStore,

    pages: PageStore,
    index: IndexStore,
    partitions: PartitionStore,

    /// One write lock per blob, created on first use
    blob_locks: Mutex<HashMap<BlobId, Arc<Mutex<()>>>>,
}

impl Engine {
    /// Open an engine rooted at `config.data_dir`
    ///
    /// Creates the data directory if it does not exist yet.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let root = config.data_dir.clone();
        info!(data_dir = %root.display(), "engine opened");

        Ok(Self {
            databases: DatabaseStore::new(&root),
            blobs: BlobStore::new(&root),
            formats: FormatStore::new(&root),
            pages: PageStore::new(&root),
            index: IndexStore::new(&root, config.index_prefix_len),
            partitions: PartitionStore::new(&root),
            blob_locks: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    // =========================================================================
    // Databases
    // =========================================================================

    pub fn create_database(&self, db: &str) -> Result<()> {
        self.databases.create(db)
    }

    /// Remove a database and all of its blobs
    pub fn drop_database(&self, db: &str) -> Result<()> {
        self.databases.delete(db)?;
        self.blob_locks.lock().retain(|blob, _| blob.db() != db);
        Ok(())
    }

    pub fn list_databases(&self) -> Result<Vec<String>> {
        self.databases.list()
    }

    // =========================================================================
    // Blobs
    // =========================================================================

    /// Create a blob with its format, page store, index and partitions
    ///
    /// All-or-nothing: if any step after the blob directory was created
    /// fails, the directory is removed again. If the directory itself cannot
    /// be created (for instance `AlreadyExists`), nothing is touched.
    pub fn create_blob(&self, blob: &BlobId, format: &Format, spec: &PartitionSpec) -> Result<()> {
        self.with_blob_lock(blob, || {
            self.blobs.create(blob)?;

            if let Err(e) = self.initialize_blob(blob, format, spec) {
                warn!(blob = %blob, error = %e, "blob setup failed, rolling back");
                if let Err(cleanup) = self.blobs.delete(blob) {
                    error!(blob = %blob, error = %cleanup, "blob rollback failed");
                }
                return Err(e);
            }

            info!(blob = %blob, keys = ?spec.keys(), "blob created");
            Ok(())
        })
    }

    /// Remove a blob and everything stored in it
    pub fn drop_blob(&self, blob: &BlobId) -> Result<()> {
        self.with_blob_lock(blob, || {
            self.blobs.delete(blob)?;
            info!(blob = %blob, "blob dropped");
            Ok(())
        })
    }

    pub fn list_blobs(&self, db: &str) -> Result<Vec<String>> {
        self.blobs.list(db)
    }

    pub fn format(&self, blob: &BlobId) -> Result<Format> {
        self.formats.get(blob)
    }

    pub fn partition_spec(&self, blob: &BlobId) -> Result<PartitionSpec> {
        self.partitions.spec(blob)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Ingest a batch of `record id → record` into a blob
    ///
    /// The blob's partition spec is read from disk; the failure policy and
    /// flush parallelism come from the config.
    pub fn ingest(&self, blob: &BlobId, batch: PageRecords) -> Result<IngestReport> {
        self.with_blob_lock(blob, || {
            let spec = self.partitions.spec(blob)?;
            self.coordinator().ingest(blob, &spec, batch)
        })
    }

    /// Delete a page, dropping it from every bucket that lists it
    ///
    /// Index entries that still point at the page are left in place.
    pub fn delete_page(&self, blob: &BlobId, page_id: &str) -> Result<bool> {
        self.with_blob_lock(blob, || {
            for hash_key in self.partitions.list_buckets(blob)? {
                if self.partitions.membership(blob, &hash_key)?.iter().any(|p| p == page_id) {
                    self.partitions.remove_page(blob, &hash_key, page_id)?;
                }
            }
            self.pages.delete(blob, page_id)
        })
    }

    /// Delete an index shard
    pub fn delete_shard(&self, blob: &BlobId, shard_id: &str) -> Result<bool> {
        self.with_blob_lock(blob, || self.index.delete(blob, shard_id))
    }

    /// Fold the index shards of one prefix into a single shard
    pub fn merge_index(&self, blob: &BlobId, prefix: &str) -> Result<Option<ShardId>> {
        self.with_blob_lock(blob, || self.index.merge_prefix(blob, prefix))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Page currently holding a record, according to the index
    pub fn locate(&self, blob: &BlobId, record_id: &str) -> Result<Option<PageId>> {
        self.index.locate(blob, record_id)
    }

    /// Fetch a record by id
    pub fn get(&self, blob: &BlobId, record_id: &str) -> Result<Option<Record>> {
        let Some(page_id) = self.index.locate(blob, record_id)? else {
            return Ok(None);
        };
        let mut records = self.pages.read(blob, &page_id)?;
        Ok(records.remove(record_id))
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    pub fn index(&self) -> &IndexStore {
        &self.index
    }

    pub fn partitions(&self) -> &PartitionStore {
        &self.partitions
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of blobs with a write lock currently tracked
    pub fn tracked_blob_locks(&self) -> usize {
        self.blob_locks.lock().len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn initialize_blob(&self, blob: &BlobId, format: &Format, spec: &PartitionSpec) -> Result<()> {
        self.formats.create(blob, format)?;
        self.pages.initialize(blob)?;
        self.index.initialize(blob)?;
        self.partitions.initialize(blob, spec)?;
        Ok(())
    }

    fn coordinator(&self) -> IngestCoordinator<'_> {
        IngestCoordinator::new(&self.pages, &self.index, &self.partitions)
            .policy(self.config.ingest_policy)
            .flush_workers(self.config.flush_workers)
    }

    /// Run a write operation under the blob's lock
    ///
    /// Once the operation is done, the lock entry of a blob that does not
    /// exist on disk is dropped, unless another writer is waiting on it.
    fn with_blob_lock<T>(&self, blob: &BlobId, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.blob_locks.lock().entry(blob.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock();
            op()
        };

        if !blob.dir(&self.config.data_dir).is_dir() {
            let mut locks = self.blob_locks.lock();
            // Only the map and `lock` hold this entry
            let idle = locks
                .get(blob)
                .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2);
            if idle {
                locks.remove(blob);
            }
        }
        result
    }
}
