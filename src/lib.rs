//! # ShelfDB
//!
//! The on-disk storage layer of a small database:
//! - Records grouped into blobs inside databases
//! - Hash partitioning of records into buckets by partition-key values
//! - Pages: JSON storage units, one fresh page per bucket per ingest batch
//! - A secondary index from record id to page, sharded by id prefix
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                               │
//! │              (one write lock per blob, rollback)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Ingest Coordinator                          │
//! │     route → allocate → flush pages → publish index shards    │
//! └──────┬──────────────────────┬───────────────────────┬───────┘
//!        │                      │                       │
//!        ▼                      ▼                       ▼
//! ┌─────────────┐      ┌─────────────────┐      ┌─────────────┐
//! │ Partitions  │      │     Pages       │      │    Index    │
//! │ (buckets)   │      │ (registry+files)│      │  (shards)   │
//! └─────────────┘      └─────────────────┘      └─────────────┘
//!        │                      │                       │
//!        └──────────────────────┼───────────────────────┘
//!                               ▼
//!                       ┌─────────────┐
//!                       │    disk     │
//!                       │ (JSON files)│
//!                       └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod disk;
pub mod layout;
pub mod record;
pub mod catalog;
pub mod storage;
pub mod ingest;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ShelfError, Result};
pub use config::{Config, IngestPolicy};
pub use engine::Engine;
pub use layout::BlobId;
pub use record::{Record, Value};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ShelfDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
