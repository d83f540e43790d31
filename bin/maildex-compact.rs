use clap::Parser;
use maildex::store::{ColumnFamily, OpenMode, Store};
use maildex::{MaildexError, StoreOptions};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "maildex-compact")]
#[command(about = "Offline chunked compaction of one column family", long_about = None)]
struct Args {
    /// Path to the database directory
    #[arg(long)]
    path: PathBuf,

    /// Column name to compact (documents or indexes)
    #[arg(long)]
    column: String,

    /// Number of MiBs to compact in one chunk
    #[arg(long, default_value_t = 1024)]
    size: u64,
}

fn run(args: &Args) -> maildex::Result<()> {
    let cf = ColumnFamily::parse(&args.column)?;
    let chunk_limit = args
        .size
        .checked_mul(1024 * 1024)
        .ok_or_else(|| MaildexError::InvalidArgument("--size is too large".to_string()))?;

    let total = Instant::now();
    let store = Store::open(&args.path, OpenMode::ReadWrite, StoreOptions::default())?;
    info!(
        elapsed_ms = total.elapsed().as_millis() as u64,
        "database opened"
    );

    let mut iter = store.iter(cf, None);
    if !iter.valid() {
        iter.status()?;
        info!(column = cf.name(), "column is empty, nothing to compact");
        return Ok(());
    }

    let mut chunks = 0u64;
    while iter.valid() {
        let chunk_start = Instant::now();
        let mut chunk_size = 0u64;

        let first_key = match iter.key() {
            Some(key) => key.to_vec(),
            None => break,
        };
        let mut last_key = first_key.clone();
        loop {
            let (key, value_len) = match (iter.key(), iter.value()) {
                (Some(key), Some(value)) => (key.to_vec(), value.len() as u64),
                _ => break,
            };
            if chunk_size >= chunk_limit {
                break;
            }
            chunk_size += value_len;
            last_key = key;
            iter.next();
        }

        store.compact(cf, Some((&first_key, &last_key)))?;
        chunks += 1;

        info!(
            elapsed_ms = total.elapsed().as_millis() as u64,
            chunk_ms = chunk_start.elapsed().as_millis() as u64,
            start = %String::from_utf8_lossy(&first_key),
            end = %String::from_utf8_lossy(&last_key),
            size_mb = chunk_size as f64 / (1024.0 * 1024.0),
            "chunk compacted"
        );
    }
    iter.status()?;

    info!(
        elapsed_ms = total.elapsed().as_millis() as u64,
        chunks,
        "column compacted"
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        error!("compaction failed: {} [{}]", e, e.code());
        std::process::exit(e.code());
    }
}
