//! # Congressional Trade Ingestion Pipeline
//!
//! Pulls disclosed stock trades by members of Congress from several public
//! providers, maps them into one canonical schema, drops duplicates and
//! writes the result to SQLite.
//!
//! ## Flow
//!
//! 1. `DedupIndex::seed` loads the keys already in the store
//! 2. Each `SourceAdapter` streams `RawRecord`s through a bounded channel
//! 3. `Normalizer` maps or rejects each record
//! 4. `DedupIndex::admit` keeps the first trade seen per
//!    `(member_name, ticker, trade_date, trade_type)`
//! 5. `BatchLoader` writes accepted trades in chunks
//!
//! Re-running against the same data inserts nothing: keys are checked in
//! memory and the table carries a UNIQUE constraint on the same columns.
//!
//! ## Schema Reference
//!
//! `/sql/01_congressional_trades.sql` → `CanonicalTrade`
//!
//! ## Module Organization
//!
//! - `types` - Core data structures (RawRecord, CanonicalTrade, DedupKey)
//! - `amount` - Disclosure amount band parsing
//! - `normalizer` - Per-source field mapping and validation
//! - `sources` - Provider adapters and the HTTP seam
//! - `rate_limiter` - Request spacing and bounded retry
//! - `dedup` - In-memory key index
//! - `loader` - Chunked writes with per-record fallback
//! - `db` - Store trait and SQLite implementation
//! - `stats` - Store statistics
//! - `engine` - Run orchestration and summary
//! - `config` - Environment configuration
//! - `error` - Error types

pub mod amount;
pub mod config;
pub mod db;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod loader;
pub mod normalizer;
pub mod rate_limiter;
pub mod sources;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use db::{run_schema_migrations, SqliteTradeStore, TradeStore};
pub use dedup::DedupIndex;
pub use engine::{IngestionEngine, RunConfig, RunSummary, SourceStats};
pub use error::{ConfigError, RejectReason, SourceError, StoreError};
pub use loader::{BatchLoader, FailedRecord, LoadOutcome};
pub use normalizer::Normalizer;
pub use rate_limiter::{RateLimiter, RetryPolicy};
pub use sources::{build_adapters, FetchReport, FetchSession, HttpRequest, HttpResponse, HttpTransport, SourceAdapter};
pub use stats::{post_run_stats, StoreStats};
pub use types::{CanonicalTrade, Chamber, DedupKey, RawRecord, SourceId, TradeType};
