//! ShelfDB Seed Binary
//!
//! Creates a database and a blob, then ingests generated demo records.

use clap::Parser;
use shelfdb::catalog::{FieldFormat, Format};
use shelfdb::record::PageRecords;
use shelfdb::storage::PartitionSpec;
use shelfdb::{BlobId, Config, Engine, Record, Value};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

/// ShelfDB demo seeder
#[derive(Parser, Debug)]
#[command(name = "shelfdb-seed")]
#[command(about = "Seed a ShelfDB data directory with demo records")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./shelfdb_data")]
    data_dir: String,

    /// Database name
    #[arg(long, default_value = "my_db")]
    db: String,

    /// Blob name
    #[arg(long, default_value = "my_blob")]
    blob: String,

    /// Number of records to generate
    #[arg(short, long, default_value = "1000")]
    records: usize,

    /// Number of distinct partition values (records use `i % buckets`)
    #[arg(short, long, default_value = "3")]
    buckets: i64,

    /// Drop the database first if it already exists
    #[arg(long)]
    fresh: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shelfdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("ShelfDB seed v{}", shelfdb::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);

    if let Err(e) = run(&args) {
        tracing::error!("Seeding failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> shelfdb::Result<()> {
    let config = Config::builder().data_dir(&args.data_dir).build();
    let engine = Engine::open(config)?;

    if args.fresh && engine.list_databases()?.contains(&args.db) {
        engine.drop_database(&args.db)?;
    }
    engine.create_database(&args.db)?;

    let blob = BlobId::new(&args.db, &args.blob)?;
    let format: Format = [
        ("col1".to_string(), FieldFormat::new("int")),
        ("col2".to_string(), FieldFormat::new("string")),
    ]
    .into_iter()
    .collect();
    engine.create_blob(&blob, &format, &PartitionSpec::new(["col1"]))?;

    let buckets = args.buckets.max(1);
    let batch: PageRecords = (0..args.records)
        .map(|i| {
            let record: Record = [
                ("col1".to_string(), Value::Int(i as i64 % buckets)),
                ("col2".to_string(), Value::from("some random string")),
            ]
            .into_iter()
            .collect();
            (Uuid::new_v4().to_string(), record)
        })
        .collect();

    let report = engine.ingest(&blob, batch)?;
    tracing::info!(
        "Seeded {}: {} records stored, {} failed, {} pages, {} index shards",
        blob,
        report.stored(),
        report.failures.len(),
        report.pages_written.len(),
        report.shards_written.len()
    );
    Ok(())
}
