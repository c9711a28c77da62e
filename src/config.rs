//! Configuration for ShelfDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, ShelfError};

/// Main configuration for a ShelfDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all databases
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {db}/
    ///         └── {blob}/
    ///             ├── format.json
    ///             ├── pages.json       (page registry)
    ///             ├── pages/           (one file per page)
    ///             ├── indexes.json     (prefix → shard ids)
    ///             ├── indexes/         (one file per shard)
    ///             ├── partitions.json  (partition spec)
    ///             └── partitions/      (one membership file per bucket)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Number of leading record-id characters that select an index shard
    pub index_prefix_len: usize,

    // -------------------------------------------------------------------------
    // Ingest Configuration
    // -------------------------------------------------------------------------
    /// What a batch does when a single record cannot be routed or written
    pub ingest_policy: IngestPolicy,

    /// Worker threads used to flush pages at the end of a batch
    pub flush_workers: usize,
}

/// Batch-level failure policy for ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestPolicy {
    /// Fail the whole batch on the first failure
    Abort,

    /// Skip failed records, report them, and keep going
    Quarantine,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./shelfdb_data"),
            index_prefix_len: 1,
            ingest_policy: IngestPolicy::Quarantine,
            flush_workers: 4,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the stores cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.index_prefix_len == 0 {
            return Err(ShelfError::Config(
                "index_prefix_len must be at least 1".to_string(),
            ));
        }
        if self.flush_workers == 0 {
            return Err(ShelfError::Config(
                "flush_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all databases)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the index shard prefix length
    pub fn index_prefix_len(mut self, len: usize) -> Self {
        self.config.index_prefix_len = len;
        self
    }

    /// Set the ingest failure policy
    pub fn ingest_policy(mut self, policy: IngestPolicy) -> Self {
        self.config.ingest_policy = policy;
        self
    }

    /// Set the number of page flush workers
    pub fn flush_workers(mut self, count: usize) -> Self {
        self.config.flush_workers = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
