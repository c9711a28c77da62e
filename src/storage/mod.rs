//! Storage Module
//!
//! The three per-blob stores the ingest path writes through.
//!
//! ## Responsibilities
//! - Pages: record content, one JSON file per page, plus a page registry
//! - Index: record id → page id, sharded by record-id prefix
//! - Partitions: record → bucket routing, and bucket → pages membership
//!
//! ## Blob Layout
//! ```text
//! {data_dir}/{db}/{blob}/
//! ├── pages.json           ["<page>.json", ...]
//! ├── pages/
//! │   └── <page>.json      {"<record id>": {"col1": 0, ...}, ...}
//! ├── indexes.json         {"<prefix>": ["<shard>.json", ...], ...}
//! ├── indexes/
//! │   └── <shard>.json     {"<record id>": "<page>.json", ...}
//! ├── partitions.json      {"keys": ["col1", ...]}
//! └── partitions/
//!     └── <hash key>       ["<page>.json", ...]
//! ```
//!
//! None of the stores lock. Each registry update reads the whole artifact,
//! mutates it and writes it back, so writers of one blob must be serialized
//! by the caller.

mod index;
mod page;
mod partition;

pub use index::{IndexRegistry, IndexStore};
pub use page::PageStore;
pub use partition::{route_key, PartitionSpec, PartitionStore, HASH_KEY_SUFFIX};
