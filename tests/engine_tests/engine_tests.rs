//! Tests for Engine
//!
//! These tests verify:
//! - Blob creation lays out every artifact
//! - Creating a blob twice fails and leaves the first intact
//! - Failed blob setup is rolled back
//! - Ingest + lookup by record id
//! - Page/shard deletion and index merging through the engine
//! - Concurrent ingests into one blob do not lose registry entries

use std::sync::Arc;
use std::thread;

use shelfdb::catalog::{FieldFormat, Format};
use shelfdb::record::PageRecords;
use shelfdb::storage::PartitionSpec;
use shelfdb::{BlobId, Config, Engine, IngestPolicy, Record, ShelfError, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .flush_workers(2)
        .build();
    let engine = Engine::open(config).unwrap();
    (temp_dir, engine)
}

fn format() -> Format {
    [
        ("col1".to_string(), FieldFormat::new("int")),
        ("col2".to_string(), FieldFormat::new("string")),
    ]
    .into_iter()
    .collect()
}

fn setup_blob(engine: &Engine) -> BlobId {
    engine.create_database("my_db").unwrap();
    let blob = BlobId::new("my_db", "my_blob").unwrap();
    engine
        .create_blob(&blob, &format(), &PartitionSpec::new(["col1"]))
        .unwrap();
    blob
}

fn batch(tag: &str, n: usize) -> PageRecords {
    (0..n)
        .map(|i| {
            let mut record = Record::new();
            record.insert("col1".to_string(), Value::Int(i as i64 % 3));
            record.insert("col2".to_string(), Value::from(tag));
            (format!("{:x}{}-{}", i % 16, tag, i), record)
        })
        .collect()
}

// =============================================================================
// Open / Blob Lifecycle Tests
// =============================================================================

#[test]
fn test_open_creates_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");

    let _engine = Engine::open_path(&data_dir).unwrap();

    assert!(data_dir.is_dir());
}

#[test]
fn test_open_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .index_prefix_len(0)
        .build();

    assert!(matches!(Engine::open(config), Err(ShelfError::Config(_))));
}

#[test]
fn test_create_blob_lays_out_artifacts() {
    let (temp, engine) = setup_temp_engine();
    let blob = setup_blob(&engine);
    let dir = blob.dir(temp.path());

    for file in ["format.json", "pages.json", "indexes.json", "partitions.json"] {
        assert!(dir.join(file).is_file(), "missing {}", file);
    }
    for sub in ["pages", "indexes", "partitions"] {
        assert!(dir.join(sub).is_dir(), "missing {}/", sub);
    }
    assert_eq!(engine.format(&blob).unwrap(), format());
    assert_eq!(engine.partition_spec(&blob).unwrap(), PartitionSpec::new(["col1"]));
    assert_eq!(engine.list_blobs("my_db").unwrap(), vec!["my_blob".to_string()]);
}

#[test]
fn test_create_blob_twice_keeps_first() {
    let (_temp, engine) = setup_temp_engine();
    let blob = setup_blob(&engine);
    engine.ingest(&blob, batch("a", 9)).unwrap();

    let result = engine.create_blob(&blob, &Format::new(), &PartitionSpec::new(["other"]));

    assert!(matches!(result, Err(ShelfError::AlreadyExists(_))));
    assert_eq!(engine.partition_spec(&blob).unwrap(), PartitionSpec::new(["col1"]));
    assert_eq!(engine.pages().list(&blob).unwrap().len(), 3);
}

#[test]
fn test_create_blob_without_database_fails() {
    let (_temp, engine) = setup_temp_engine();
    let blob = BlobId::new("missing_db", "blob").unwrap();

    let result = engine.create_blob(&blob, &format(), &PartitionSpec::new(["col1"]));

    assert!(matches!(result, Err(ShelfError::Io(_))));
}

/// Linux rejects paths of 4096 bytes or more. A blob directory of exactly
/// 4083 bytes leaves room for `format.json` and `pages.json` but not for
/// `indexes.json`, so setup fails halfway through.
#[cfg(target_os = "linux")]
#[test]
fn test_failed_setup_is_rolled_back() {
    const BLOB_DIR_LEN: usize = 4083;

    let temp_dir = TempDir::new().unwrap();
    let mut data_dir = temp_dir.path().to_path_buf();
    while data_dir.as_os_str().len() + 101 <= 3900 {
        data_dir.push("d".repeat(100));
    }
    let engine = Engine::open_path(&data_dir).unwrap();

    let pad = BLOB_DIR_LEN - data_dir.as_os_str().len() - 2;
    let db = "b".repeat(pad / 2);
    let blob = BlobId::new(db.clone(), "x".repeat(pad - pad / 2)).unwrap();
    assert_eq!(blob.dir(&data_dir).as_os_str().len(), BLOB_DIR_LEN);
    engine.create_database(&db).unwrap();

    let result = engine.create_blob(&blob, &format(), &PartitionSpec::new(["col1"]));

    assert!(matches!(result, Err(ShelfError::Io(_))));
    assert!(!blob.dir(&data_dir).exists());
    assert!(engine.list_blobs(&db).unwrap().is_empty());
}

#[test]
fn test_drop_blob_and_database() {
    let (temp, engine) = setup_temp_engine();
    let blob = setup_blob(&engine);

    engine.drop_blob(&blob).unwrap();
    assert!(!blob.dir(temp.path()).exists());
    assert!(engine.list_blobs("my_db").unwrap().is_empty());

    engine.drop_database("my_db").unwrap();
    assert!(engine.list_databases().unwrap().is_empty());
}

// =============================================================================
// Ingest / Read Tests
// =============================================================================

#[test]
fn test_ingest_then_get() {
    let (_temp, engine) = setup_temp_engine();
    let blob = setup_blob(&engine);
    let records = batch("a", 50);

    let report = engine.ingest(&blob, records.clone()).unwrap();

    assert!(report.is_clean());
    for (id, record) in &records {
        assert_eq!(engine.get(&blob, id).unwrap().as_ref(), Some(record));
    }
    assert_eq!(engine.get(&blob, "unknown").unwrap(), None);
}

#[test]
fn test_ingest_unknown_blob_fails() {
    let (_temp, engine) = setup_temp_engine();
    let blob = BlobId::new("nope", "nope").unwrap();

    let result = engine.ingest(&blob, batch("a", 3));

    assert!(matches!(result, Err(ShelfError::NotFound(_))));
}

#[test]
fn test_ingest_policy_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .ingest_policy(IngestPolicy::Abort)
        .build();
    let engine = Engine::open(config).unwrap();
    let blob = setup_blob(&engine);
    let mut records = batch("a", 3);
    records.insert("broken".to_string(), Record::new());

    let result = engine.ingest(&blob, records);

    assert!(matches!(result, Err(ShelfError::MissingPartitionField(_))));
    assert!(engine.pages().list(&blob).unwrap().is_empty());
}

#[test]
fn test_reingested_record_resolves_to_latest_page() {
    let (_temp, engine) = setup_temp_engine();
    let blob = setup_blob(&engine);

    let mut first = PageRecords::new();
    let mut record = Record::new();
    record.insert("col1".to_string(), Value::Int(1));
    record.insert("col2".to_string(), Value::from("v1"));
    first.insert("abc".to_string(), record.clone());
    engine.ingest(&blob, first).unwrap();

    let mut second = PageRecords::new();
    record.insert("col2".to_string(), Value::from("v2"));
    second.insert("abc".to_string(), record.clone());
    engine.ingest(&blob, second).unwrap();

    assert_eq!(engine.get(&blob, "abc").unwrap(), Some(record));
    assert_eq!(engine.index().shards_for_prefix(&blob, "a").unwrap().len(), 2);
}

// =============================================================================
// Maintenance Tests
// =============================================================================

#[test]
fn test_delete_page_drops_bucket_membership() {
    let (_temp, engine) = setup_temp_engine();
    let blob = setup_blob(&engine);
    let report = engine.ingest(&blob, batch("a", 9)).unwrap();
    let page = report.pages_written[0].clone();

    assert!(engine.delete_page(&blob, &page).unwrap());

    assert!(!engine.pages().list(&blob).unwrap().contains(&page));
    for bucket in engine.partitions().list_buckets(&blob).unwrap() {
        assert!(!engine
            .partitions()
            .membership(&blob, &bucket)
            .unwrap()
            .contains(&page));
    }
}

#[test]
fn test_delete_shard_and_merge_index() {
    let (_temp, engine) = setup_temp_engine();
    let blob = setup_blob(&engine);
    let first = batch("a", 32);
    let second = batch("b", 32);
    engine.ingest(&blob, first.clone()).unwrap();
    engine.ingest(&blob, second.clone()).unwrap();

    let merged = engine.merge_index(&blob, "0").unwrap().unwrap();
    assert_eq!(engine.index().shards_for_prefix(&blob, "0").unwrap(), vec![merged.clone()]);
    for id in first.keys().chain(second.keys()) {
        assert!(engine.locate(&blob, id).unwrap().is_some());
    }

    assert!(engine.delete_shard(&blob, &merged).unwrap());
    assert!(engine.index().shards_for_prefix(&blob, "0").unwrap().is_empty());
    assert_eq!(engine.locate(&blob, "0a-0").unwrap(), None);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_write_locks_are_released_for_missing_blobs() {
    let (_temp, engine) = setup_temp_engine();
    let missing = BlobId::new("nope", "nope").unwrap();

    assert!(engine.ingest(&missing, batch("a", 3)).is_err());
    assert!(engine.delete_shard(&missing, "x.json").is_err());
    assert_eq!(engine.tracked_blob_locks(), 0);

    let blob = setup_blob(&engine);
    engine.ingest(&blob, batch("a", 3)).unwrap();
    assert_eq!(engine.tracked_blob_locks(), 1);

    engine.drop_blob(&blob).unwrap();
    assert_eq!(engine.tracked_blob_locks(), 0);
}

#[test]
fn test_concurrent_ingest_same_blob() {
    let (_temp, engine) = setup_temp_engine();
    let blob = setup_blob(&engine);
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let blob = blob.clone();
            thread::spawn(move || {
                engine
                    .ingest(&blob, batch(&format!("t{}", t), 30))
                    .unwrap()
            })
        })
        .collect();

    let mut stored = 0;
    for handle in handles {
        stored += handle.join().unwrap().stored();
    }

    assert_eq!(stored, 120);
    // 4 batches x 3 buckets, none lost to racing registry writes
    assert_eq!(engine.pages().list(&blob).unwrap().len(), 12);
    for bucket in engine.partitions().list_buckets(&blob).unwrap() {
        assert_eq!(engine.partitions().membership(&blob, &bucket).unwrap().len(), 4);
    }
    let registry = engine.index().registry(&blob).unwrap();
    assert!(registry.values().all(|shards| shards.len() == 4));
}
