//! Catalog Module
//!
//! Database and blob directories, and the per-blob format document. These are
//! plain directory/file operations; they hold no knowledge of pages, buckets
//! or index shards.

mod blob;
mod database;
mod format;

pub use blob::BlobStore;
pub use database::DatabaseStore;
pub use format::{FieldFormat, Format, FormatStore};
