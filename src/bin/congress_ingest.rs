//! Congressional trade ingestion
//!
//! Fetches trades from the selected providers, normalizes and deduplicates
//! them, and writes new ones to SQLite. Source failures are logged and
//! skipped; the exit code is non-zero only when the store is unusable.
//!
//! Usage:
//!   cargo run --release --bin congress-ingest -- --source hsw,finnhub --dry-run
//!   cargo run --release --bin congress-ingest -- --stats
//!
//! Environment variables:
//!   TRADES_DB_PATH - SQLite database path (required)
//!   FINNHUB_API_KEY / QUIVER_API_KEY - provider credentials (optional)
//!   RUST_LOG - log level (default: info)

use clap::Parser;
use congress_ingest::pipeline::{
    build_adapters, post_run_stats, FetchSession, IngestionEngine, PipelineConfig, RunConfig, SourceId, SqliteTradeStore,
    TradeStore,
};
use dotenv::dotenv;
use log::info;

#[derive(Parser, Debug)]
#[command(name = "congress-ingest", about = "Congressional trade ingestion pipeline")]
struct Cli {
    /// Sources to fetch, in order (hsw, quiver, finnhub, capitol_trades, all)
    #[arg(long = "source", value_delimiter = ',', default_value = "all")]
    sources: Vec<String>,

    /// Fetch and normalize, but do not write
    #[arg(long)]
    dry_run: bool,

    /// Max raw records per source
    #[arg(long)]
    limit: Option<usize>,

    /// Print database stats and exit
    #[arg(long)]
    stats: bool,

    /// Trades shown in a dry run
    #[arg(long, default_value_t = 5)]
    preview: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let sources = SourceId::parse_selection(&cli.sources)?;

    let config = PipelineConfig::from_env()?;

    info!("🚀 Congressional Trade Ingestion");
    info!("   ├─ Database: {}", config.db_path);
    info!(
        "   ├─ Sources: {}",
        sources.iter().map(SourceId::as_str).collect::<Vec<_>>().join(", ")
    );
    info!("   └─ Mode: {}", if cli.dry_run { "dry run" } else { "write" });

    let store = SqliteTradeStore::new(&config.db_path)?;
    store.run_migrations(&config.schema_dir)?;

    if cli.stats {
        println!("{}", store.stats().await?);
        return Ok(());
    }

    let run_config = RunConfig {
        record_limit: cli.limit,
        dry_run: cli.dry_run,
        preview_count: cli.preview,
        ..RunConfig::from_pipeline(&config)
    };

    let session = FetchSession::from_config(&config)?;
    let adapters = build_adapters(&config, &sources);
    let engine = IngestionEngine::new(run_config);

    let summary = engine.run(&store, &adapters, &session).await;
    println!("{}", summary);

    if !cli.dry_run {
        if let Some(stats) = post_run_stats(&store).await {
            println!("{}", stats);
        }
    }

    Ok(())
}
