use anyhow::Result;
use clap::Parser;
use maildex::{AppState, Config, OpenMode, SearchEngine, SearchMetrics};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "maildex")]
#[command(about = "Embedded full-text search service", long_about = None)]
struct Args {
    /// Path to the database directory
    #[arg(long, env = "MAILDEX_PATH")]
    path: PathBuf,

    /// Listen address for the HTTP API
    #[arg(long, env = "MAILDEX_LISTEN", default_value = "127.0.0.1:8080")]
    listen: String,

    /// Postings per shard
    #[arg(long, env = "MAILDEX_TOKENS_SHARD_SIZE", default_value_t = 4_000_000)]
    tokens_shard_size: u64,

    /// Periodic metadata flush interval in milliseconds (0 disables)
    #[arg(long, env = "MAILDEX_SYNC_METADATA_TIMEOUT_MS", default_value_t = 60_000)]
    sync_metadata_timeout_ms: u64,

    /// Open the database read-only (search and point reads only)
    #[arg(long, env = "MAILDEX_READ_ONLY")]
    read_only: bool,

    /// Tune the store for high write throughput
    #[arg(long, env = "MAILDEX_BULK_LOAD")]
    bulk_load: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Starting maildex v{}", maildex::VERSION);

    let mode = if args.read_only {
        OpenMode::ReadOnly
    } else if args.bulk_load {
        OpenMode::BulkLoad
    } else {
        OpenMode::ReadWrite
    };

    let config = Config::default()
        .with_tokens_shard_size(args.tokens_shard_size)
        .with_sync_metadata_timeout_ms(args.sync_metadata_timeout_ms);

    info!("  Path: {:?}", args.path);
    info!("  Mode: {:?}", mode);
    info!("  Tokens shard size: {}", config.store.tokens_shard_size);
    info!(
        "  Metadata flush interval: {}ms",
        config.store.sync_metadata_timeout_ms
    );

    let engine = Arc::new(SearchEngine::open(&args.path, mode, config)?);
    let metrics = Arc::new(SearchMetrics::new()?);

    let app = maildex::create_router(AppState {
        engine: Arc::clone(&engine),
        metrics,
    });

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!("HTTP API listening on {}", args.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal, exiting");
        })
        .await?;

    // Dropping the engine stops the flusher and forces the final
    // metadata flush.
    drop(engine);

    Ok(())
}
