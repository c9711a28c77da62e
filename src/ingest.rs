//! Ingest Module
//!
//! Drives one batch of new records through the partition router, the page
//! store and the index shard store.
//!
//! ## Batch Pipeline
//! ```text
//! records ──route──▶ hash key ──group──▶ one fresh page per hash key
//!                                              │
//!                       write page content ◀───┘   (parallel, per page)
//!                       add page to bucket
//!                                              │
//!        prefix buffers ◀── records whose page flushed
//!              │
//!              └──▶ one new index shard per prefix (content, then registry)
//! ```
//!
//! Every batch gets its own generation of pages: pages written by earlier
//! batches are never reopened or extended, so page count grows by one per
//! touched bucket per batch. Likewise every batch adds one shard per touched
//! prefix; see `IndexStore::merge_prefix` for folding them back together.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::config::IngestPolicy;
use crate::error::{Result, ShelfError};
use crate::layout::BlobId;
use crate::record::{check_record, HashKey, IndexRecords, PageId, PageRecords, ShardId};
use crate::storage::{route_key, IndexStore, PageStore, PartitionSpec, PartitionStore};

// =============================================================================
// Report
// =============================================================================

/// Where a stored record ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub hash_key: HashKey,
    pub page_id: PageId,
    pub shard_id: ShardId,
}

/// Pipeline step at which a record was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    /// Record id rejected, partition field missing or value not storable
    Route,
    /// No page could be allocated for the record's bucket
    Allocate,
    /// Page content or bucket membership could not be written; the page
    /// is discarded
    PageWrite,
    /// Page was written but the index shard was not
    Index,
}

/// A record that did not make it through the batch
#[derive(Debug, Clone)]
pub struct RecordFailure {
    pub record_id: String,
    pub stage: IngestStage,
    pub message: String,
}

/// Per-record outcome of a batch
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Fully stored and indexed records
    pub placements: BTreeMap<String, Placement>,

    /// Records skipped under `IngestPolicy::Quarantine`
    pub failures: Vec<RecordFailure>,

    /// Pages whose content and bucket membership were written
    pub pages_written: Vec<PageId>,

    /// Index shards published by this batch
    pub shards_written: Vec<ShardId>,
}

impl IngestReport {
    /// True when every record in the batch was stored and indexed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn stored(&self) -> usize {
        self.placements.len()
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// One page's worth of pending records
struct PageJob {
    hash_key: HashKey,
    page_id: PageId,
    records: PageRecords,
}

/// Orchestrates a batch write across the three stores
///
/// Holds no persistent state of its own; everything it accumulates lives for
/// the duration of one `ingest` call. The caller must make sure no other
/// writer touches the same blob while a batch runs.
pub struct IngestCoordinator<'a> {
    pages: &'a PageStore,
    index: &'a IndexStore,
    partitions: &'a PartitionStore,
    policy: IngestPolicy,
    flush_workers: usize,
}

impl<'a> IngestCoordinator<'a> {
    pub fn new(
        pages: &'a PageStore,
        index: &'a IndexStore,
        partitions: &'a PartitionStore,
    ) -> Self {
        Self {
            pages,
            index,
            partitions,
            policy: IngestPolicy::Quarantine,
            flush_workers: 1,
        }
    }

    /// Set the batch failure policy
    pub fn policy(mut self, policy: IngestPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the number of page flush workers
    pub fn flush_workers(mut self, count: usize) -> Self {
        self.flush_workers = count.max(1);
        self
    }

    /// Ingest a batch of `record id → record`
    ///
    /// Under `IngestPolicy::Abort` the first failure is returned as the error
    /// and the batch is rolled back: its pages leave their buckets and the
    /// registry, and its shards are deleted. Routing failures are detected
    /// before anything touches disk. Under `IngestPolicy::Quarantine` failed
    /// records are listed in the report and the rest of the batch proceeds.
    pub fn ingest(
        &self,
        blob: &BlobId,
        spec: &PartitionSpec,
        batch: PageRecords,
    ) -> Result<IngestReport> {
        let total = batch.len();
        let mut report = IngestReport::default();
        let mut allocated = Vec::new();

        if let Err(e) = self.run(blob, spec, batch, &mut report, &mut allocated) {
            warn!(blob = %blob, error = %e, pages = allocated.len(), "ingest failed, rolling back");
            for shard_id in &report.shards_written {
                if let Err(cleanup) = self.index.delete(blob, shard_id) {
                    warn!(blob = %blob, shard = %shard_id, error = %cleanup, "shard rollback failed");
                }
            }
            for (hash_key, page_id) in &allocated {
                self.discard_page(blob, hash_key, page_id);
            }
            return Err(e);
        }

        info!(
            blob = %blob,
            records = total,
            stored = report.stored(),
            failed = report.failures.len(),
            pages = report.pages_written.len(),
            shards = report.shards_written.len(),
            "ingest batch complete"
        );
        Ok(report)
    }

    /// The four batch steps; every allocated page is recorded in `allocated`
    fn run(
        &self,
        blob: &BlobId,
        spec: &PartitionSpec,
        batch: PageRecords,
        report: &mut IngestReport,
        allocated: &mut Vec<(HashKey, PageId)>,
    ) -> Result<()> {
        // Step 1: Route every record and group by bucket
        let mut groups: BTreeMap<HashKey, PageRecords> = BTreeMap::new();
        for (record_id, record) in batch {
            let routed = if record_id.is_empty() {
                Err(ShelfError::InvalidRecordId(record_id.clone()))
            } else {
                check_record(&record).and_then(|()| route_key(spec, &record))
            };
            match routed {
                Ok(hash_key) => {
                    groups.entry(hash_key).or_default().insert(record_id, record);
                }
                Err(e) => self.reject(report, [record_id], IngestStage::Route, e)?,
            }
        }

        // Step 2: One fresh page per bucket touched by this batch
        let mut jobs = Vec::with_capacity(groups.len());
        for (hash_key, records) in groups {
            match self.pages.allocate(blob) {
                Ok(page_id) => {
                    allocated.push((hash_key.clone(), page_id.clone()));
                    jobs.push(PageJob {
                        hash_key,
                        page_id,
                        records,
                    });
                }
                Err(e) => self.reject(report, records.into_keys(), IngestStage::Allocate, e)?,
            }
        }

        // Step 3: Write pages, then publish them in their buckets
        let outcomes = self.flush_pages(blob, &jobs)?;

        let mut bucket_of_page: BTreeMap<PageId, HashKey> = BTreeMap::new();
        let mut prefixes: BTreeMap<String, IndexRecords> = BTreeMap::new();
        for (job, outcome) in jobs.into_iter().zip(outcomes) {
            if let Err(e) = outcome {
                self.reject(report, job.records.into_keys(), IngestStage::PageWrite, e)?;
                self.discard_page(blob, &job.hash_key, &job.page_id);
                continue;
            }
            for record_id in job.records.into_keys() {
                let prefix = self.index.prefix_of(&record_id).to_string();
                prefixes
                    .entry(prefix)
                    .or_default()
                    .insert(record_id, job.page_id.clone());
            }
            report.pages_written.push(job.page_id.clone());
            bucket_of_page.insert(job.page_id, job.hash_key);
        }

        // Step 4: One new shard per prefix, only for records whose page landed
        for (prefix, entries) in prefixes {
            match self.index.allocate_with(blob, &prefix, &entries) {
                Ok(shard_id) => {
                    for (record_id, page_id) in entries {
                        let hash_key = bucket_of_page.get(&page_id).cloned().unwrap_or_default();
                        report.placements.insert(
                            record_id,
                            Placement {
                                hash_key,
                                page_id,
                                shard_id: shard_id.clone(),
                            },
                        );
                    }
                    report.shards_written.push(shard_id);
                }
                Err(e) => self.reject(report, entries.into_keys(), IngestStage::Index, e)?,
            }
        }
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Write every page on scoped worker threads
    ///
    /// Each job owns a distinct page file and a distinct bucket file, so the
    /// workers share no registry. Outcomes come back in job order.
    fn flush_pages(&self, blob: &BlobId, jobs: &[PageJob]) -> Result<Vec<Result<()>>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let workers = self.flush_workers.min(jobs.len());
        let chunk_size = jobs.len().div_ceil(workers);

        crossbeam::thread::scope(|s| {
            let handles: Vec<_> = jobs
                .chunks(chunk_size)
                .map(|chunk| {
                    s.spawn(move |_| {
                        chunk
                            .iter()
                            .map(|job| self.flush_page(blob, job))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<std::thread::Result<Vec<_>>>()
        })
        .and_then(|joined| joined)
        .map(|chunks| chunks.into_iter().flatten().collect::<Vec<_>>())
        .map_err(|_| ShelfError::Storage("page flush worker panicked".to_string()))
    }

    fn flush_page(&self, blob: &BlobId, job: &PageJob) -> Result<()> {
        self.pages.write(blob, &job.page_id, &job.records)?;
        self.partitions.add_page(blob, &job.hash_key, &job.page_id)
    }

    /// Best-effort removal of a page written by this batch
    ///
    /// Drops the page from its bucket (and the bucket itself once empty),
    /// then deletes the page file and its registry entry.
    fn discard_page(&self, blob: &BlobId, hash_key: &str, page_id: &str) {
        let removed = self
            .partitions
            .remove_page(blob, hash_key, page_id)
            .and_then(|()| self.partitions.membership(blob, hash_key))
            .and_then(|pages| {
                if pages.is_empty() {
                    self.partitions.delete_bucket(blob, hash_key)
                } else {
                    Ok(())
                }
            });
        match removed {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(blob = %blob, bucket = %hash_key, error = %e, "bucket cleanup failed"),
        }

        if let Err(e) = self.pages.delete(blob, page_id) {
            warn!(blob = %blob, page = %page_id, error = %e, "page cleanup failed");
        }
    }

    /// Apply the batch policy to records that failed at `stage`
    fn reject<I>(
        &self,
        report: &mut IngestReport,
        record_ids: I,
        stage: IngestStage,
        err: ShelfError,
    ) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        if self.policy == IngestPolicy::Abort {
            return Err(err);
        }

        let message = err.to_string();
        let before = report.failures.len();
        report
            .failures
            .extend(record_ids.into_iter().map(|record_id| RecordFailure {
                record_id,
                stage,
                message: message.clone(),
            }));

        warn!(
            stage = ?stage,
            records = report.failures.len() - before,
            error = %message,
            "records quarantined"
        );
        Ok(())
    }
}
