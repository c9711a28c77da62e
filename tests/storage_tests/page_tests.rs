//! Tests for PageStore
//!
//! These tests verify:
//! - Initializing the registry and page directory
//! - Allocation registers an empty page
//! - Full-overwrite writes and read-back
//! - Deletion (idempotent, always cleans the registry)

use std::fs;
use std::path::PathBuf;

use shelfdb::record::{PageRecords, Record};
use shelfdb::storage::PageStore;
use shelfdb::{BlobId, ShelfError, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_blob() -> (TempDir, PathBuf, BlobId) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().to_path_buf();
    let blob = BlobId::new("db", "blob").unwrap();
    fs::create_dir_all(blob.dir(&root)).unwrap();
    (temp_dir, root, blob)
}

fn setup_store() -> (TempDir, PageStore, BlobId) {
    let (temp, root, blob) = setup_blob();
    let store = PageStore::new(&root);
    store.initialize(&blob).unwrap();
    (temp, store, blob)
}

fn page_with(entries: &[(&str, i64)]) -> PageRecords {
    entries
        .iter()
        .map(|(id, v)| {
            let mut record = Record::new();
            record.insert("col1".to_string(), Value::Int(*v));
            (id.to_string(), record)
        })
        .collect()
}

// =============================================================================
// Initialize Tests
// =============================================================================

#[test]
fn test_initialize_creates_registry_and_dir() {
    let (_temp, root, blob) = setup_blob();
    let store = PageStore::new(&root);

    store.initialize(&blob).unwrap();

    assert!(blob.dir(&root).join("pages.json").is_file());
    assert!(blob.dir(&root).join("pages").is_dir());
    assert!(store.list(&blob).unwrap().is_empty());
}

#[test]
fn test_initialize_twice_fails() {
    let (_temp, store, blob) = setup_store();
    let page = store.allocate(&blob).unwrap();

    let result = store.initialize(&blob);

    assert!(matches!(result, Err(ShelfError::AlreadyExists(_))));
    assert_eq!(store.list(&blob).unwrap(), vec![page]);
}

#[test]
fn test_initialize_missing_blob_dir_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let store = PageStore::new(temp_dir.path());
    let blob = BlobId::new("db", "missing").unwrap();

    assert!(matches!(store.initialize(&blob), Err(ShelfError::Io(_))));
}

// =============================================================================
// Allocate Tests
// =============================================================================

#[test]
fn test_allocate_registers_empty_page() {
    let (_temp, store, blob) = setup_store();

    let page = store.allocate(&blob).unwrap();

    assert!(page.ends_with(".json"));
    assert_eq!(store.list(&blob).unwrap(), vec![page.clone()]);
    assert!(store.read(&blob, &page).unwrap().is_empty());
}

#[test]
fn test_allocate_keeps_order_and_unique_ids() {
    let (_temp, store, blob) = setup_store();

    let pages: Vec<_> = (0..5).map(|_| store.allocate(&blob).unwrap()).collect();

    assert_eq!(store.list(&blob).unwrap(), pages);
    let mut unique = pages.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 5);
}

#[test]
fn test_allocate_uninitialized_blob_fails() {
    let (_temp, root, blob) = setup_blob();
    let store = PageStore::new(&root);

    assert!(store.allocate(&blob).is_err());
}

// =============================================================================
// Read / Write Tests
// =============================================================================

#[test]
fn test_write_then_read() {
    let (_temp, store, blob) = setup_store();
    let page = store.allocate(&blob).unwrap();
    let content = page_with(&[("a1", 1), ("b2", 2)]);

    store.write(&blob, &page, &content).unwrap();

    assert_eq!(store.read(&blob, &page).unwrap(), content);
}

#[test]
fn test_write_replaces_whole_content() {
    let (_temp, store, blob) = setup_store();
    let page = store.allocate(&blob).unwrap();

    store.write(&blob, &page, &page_with(&[("a1", 1), ("b2", 2)])).unwrap();
    store.write(&blob, &page, &page_with(&[("c3", 3)])).unwrap();

    let content = store.read(&blob, &page).unwrap();
    assert_eq!(content.len(), 1);
    assert!(content.contains_key("c3"));
}

#[test]
fn test_read_missing_page_is_not_found() {
    let (_temp, store, blob) = setup_store();

    let result = store.read(&blob, "nope.json");

    assert!(matches!(result, Err(ShelfError::NotFound(_))));
}

#[test]
fn test_write_unallocated_page_fails() {
    let (_temp, store, blob) = setup_store();

    let result = store.write(&blob, "nope.json", &page_with(&[("a", 1)]));

    assert!(result.is_err());
    assert!(store.list(&blob).unwrap().is_empty());
}

#[test]
fn test_path_like_page_id_rejected() {
    let (_temp, store, blob) = setup_store();

    let result = store.read(&blob, "../pages.json");

    assert!(matches!(result, Err(ShelfError::InvalidName(_))));
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_removes_file_and_registry_entry() {
    let (_temp, store, blob) = setup_store();
    let p1 = store.allocate(&blob).unwrap();
    let p2 = store.allocate(&blob).unwrap();

    assert!(store.delete(&blob, &p1).unwrap());

    assert_eq!(store.list(&blob).unwrap(), vec![p2]);
    assert!(matches!(store.read(&blob, &p1), Err(ShelfError::NotFound(_))));
}

#[test]
fn test_delete_missing_page_returns_false() {
    let (_temp, store, blob) = setup_store();
    let page = store.allocate(&blob).unwrap();

    assert!(!store.delete(&blob, "nope.json").unwrap());
    assert_eq!(store.list(&blob).unwrap(), vec![page]);
}

#[test]
fn test_delete_cleans_registry_when_file_already_gone() {
    let (_temp, root, blob) = setup_blob();
    let store = PageStore::new(&root);
    store.initialize(&blob).unwrap();
    let page = store.allocate(&blob).unwrap();

    fs::remove_file(blob.dir(&root).join("pages").join(&page)).unwrap();

    assert!(!store.delete(&blob, &page).unwrap());
    assert!(store.list(&blob).unwrap().is_empty());
}
