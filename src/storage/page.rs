//! Page Store
//!
//! Owns the page files of a blob and the page registry that enumerates them.
//!
//! ## Responsibilities
//! - Allocate fresh, empty pages
//! - Persist and read back page content (full overwrite, never merged)
//! - Remove pages from disk and from the registry

use std::path::PathBuf;

use tracing::debug;
use uuid::Uuid;

use crate::disk;
use crate::error::{Result, ShelfError};
use crate::layout::{self, BlobId};
use crate::record::{PageId, PageRecords};

/// Manages page files and the page registry
///
/// Holds nothing but the data root; every call reads the registry from disk.
/// Registry updates are read-modify-write, so callers must serialize writers
/// of the same blob (see `Engine`).
#[derive(Debug, Clone)]
pub struct PageStore {
    /// Root directory of all databases
    root: PathBuf,
}

impl PageStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const REGISTRY_FILENAME: &'static str = "pages.json";
    const PAGE_DIR: &'static str = "pages";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create an empty registry and an empty page directory
    pub fn initialize(&self, blob: &BlobId) -> Result<()> {
        let dir = self.page_dir(blob);
        if dir.exists() {
            return Err(ShelfError::AlreadyExists(dir.display().to_string()));
        }

        disk::create_json(&self.registry_path(blob), &Vec::<PageId>::new())?;
        disk::create_dir(&dir)?;

        debug!(blob = %blob, "page store initialized");
        Ok(())
    }

    /// Allocate a new empty page and register it
    ///
    /// The page file is written before the registry entry, so a crash in
    /// between leaves an unregistered page, never a dangling registry entry.
    pub fn allocate(&self, blob: &BlobId) -> Result<PageId> {
        let page_id = format!("{}.json", Uuid::new_v4());
        disk::create_json(&self.page_path(blob, &page_id)?, &PageRecords::new())?;

        let mut pages = self.list(blob)?;
        pages.push(page_id.clone());
        disk::write_json(&self.registry_path(blob), &pages)?;

        debug!(blob = %blob, page = %page_id, "page allocated");
        Ok(page_id)
    }

    /// All registered pages, in allocation order
    pub fn list(&self, blob: &BlobId) -> Result<Vec<PageId>> {
        disk::read_json(&self.registry_path(blob))
    }

    /// Read the content of a page
    pub fn read(&self, blob: &BlobId, page_id: &str) -> Result<PageRecords> {
        disk::read_json(&self.page_path(blob, page_id)?)
    }

    /// Replace the entire content of a page
    pub fn write(&self, blob: &BlobId, page_id: &str, content: &PageRecords) -> Result<()> {
        disk::write_json(&self.page_path(blob, page_id)?, content)?;
        debug!(blob = %blob, page = %page_id, records = content.len(), "page written");
        Ok(())
    }

    /// Delete a page and drop it from the registry
    ///
    /// Returns whether the page file existed. The registry is cleaned up
    /// either way.
    pub fn delete(&self, blob: &BlobId, page_id: &str) -> Result<bool> {
        let existed = match disk::delete_file(&self.page_path(blob, page_id)?) {
            Ok(()) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e),
        };

        let mut pages = self.list(blob)?;
        if let Some(pos) = pages.iter().position(|p| p == page_id) {
            pages.remove(pos);
            disk::write_json(&self.registry_path(blob), &pages)?;
        }

        debug!(blob = %blob, page = %page_id, existed, "page deleted");
        Ok(existed)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn registry_path(&self, blob: &BlobId) -> PathBuf {
        blob.dir(&self.root).join(Self::REGISTRY_FILENAME)
    }

    fn page_dir(&self, blob: &BlobId) -> PathBuf {
        blob.dir(&self.root).join(Self::PAGE_DIR)
    }

    fn page_path(&self, blob: &BlobId, page_id: &str) -> Result<PathBuf> {
        layout::validate_name(page_id)?;
        Ok(self.page_dir(blob).join(page_id))
    }
}
