//! Ingestion Engine - orchestrates one run across all selected sources
//!
//! ```text
//! SourceAdapter::fetch ──mpsc──▶ consumer loop
//!                                  │ normalize  (rejected)
//!                                  │ dedup      (duplicate)
//!                                  ▼
//!                               accepted ──▶ BatchLoader ──▶ TradeStore
//! ```
//!
//! Sources run one after another in the configured order, so when two
//! sources report the same trade the earlier source's version is kept.
//! Within a source, the adapter and the consumer run concurrently and
//! records are processed as they arrive.

use super::config::PipelineConfig;
use super::db::TradeStore;
use super::dedup::DedupIndex;
use super::loader::{BatchLoader, FailedRecord, DEFAULT_CHUNK_SIZE};
use super::normalizer::Normalizer;
use super::sources::{FetchSession, SourceAdapter};
use super::types::{CanonicalTrade, Chamber, SourceId, TradeType};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::mpsc;

/// Per-run options
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Cap on raw records consumed per source
    pub record_limit: Option<usize>,
    /// Fetch, normalize and dedup, but write nothing
    pub dry_run: bool,
    /// Accepted trades shown in a dry run
    pub preview_count: usize,
    pub channel_buffer: usize,
    pub dedup_page_size: usize,
    pub batch_size: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            record_limit: None,
            dry_run: false,
            preview_count: 5,
            channel_buffer: 1_000,
            dedup_page_size: 1_000,
            batch_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl RunConfig {
    /// Sizes from the pipeline configuration, run flags at their defaults
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            channel_buffer: config.channel_buffer,
            dedup_page_size: config.dedup_page_size,
            batch_size: config.batch_size,
            ..Default::default()
        }
    }
}

/// Counters for one source
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceStats {
    /// Raw records consumed
    pub fetched: usize,
    /// Failed normalization
    pub rejected: usize,
    /// Key already in the store or seen earlier in this run
    pub duplicates: usize,
    /// Passed normalization and dedup
    pub accepted: usize,
    pub inserted: usize,
    /// Accepted but could not be written
    pub failed: usize,
    /// Items (tickers, pages) the adapter skipped
    pub skipped_items: usize,
    /// Stopped at the record limit
    pub stopped_early: bool,
    /// Why the source contributed nothing, if it was unusable
    pub unavailable: Option<String>,
}

/// Everything a run produced, for the final report
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub dry_run: bool,
    /// In execution order
    pub sources: Vec<(SourceId, SourceStats)>,
    pub by_chamber: BTreeMap<Chamber, usize>,
    pub by_trade_type: BTreeMap<TradeType, usize>,
    /// Accepted trades the store already had (cross-process race)
    pub conflicts: usize,
    pub failed: Vec<FailedRecord>,
    /// First accepted trades, dry run only
    pub preview: Vec<CanonicalTrade>,
}

impl RunSummary {
    pub fn source(&self, id: SourceId) -> Option<&SourceStats> {
        self.sources.iter().find(|(s, _)| *s == id).map(|(_, stats)| stats)
    }

    pub fn total_fetched(&self) -> usize {
        self.sources.iter().map(|(_, s)| s.fetched).sum()
    }

    pub fn total_accepted(&self) -> usize {
        self.sources.iter().map(|(_, s)| s.accepted).sum()
    }

    pub fn total_inserted(&self) -> usize {
        self.sources.iter().map(|(_, s)| s.inserted).sum()
    }

    fn source_mut(&mut self, id: SourceId) -> Option<&mut SourceStats> {
        self.sources.iter_mut().find(|(s, _)| *s == id).map(|(_, stats)| stats)
    }
}

pub struct IngestionEngine {
    config: RunConfig,
    normalizer: Normalizer,
    loader: BatchLoader,
}

impl IngestionEngine {
    pub fn new(config: RunConfig) -> Self {
        let loader = BatchLoader::new(config.batch_size);
        Self {
            config,
            normalizer: Normalizer::new(),
            loader,
        }
    }

    /// Fetch every source, then write the accepted trades
    ///
    /// Source failures never abort the run; they are recorded in the
    /// summary and the remaining sources still run.
    pub async fn run(
        &self,
        store: &dyn TradeStore,
        adapters: &[Box<dyn SourceAdapter>],
        session: &FetchSession,
    ) -> RunSummary {
        log::info!("🚀 Starting ingestion: {} sources{}", adapters.len(), if self.config.dry_run { " (dry run)" } else { "" });

        let mut summary = RunSummary {
            dry_run: self.config.dry_run,
            ..Default::default()
        };
        let mut dedup = DedupIndex::seed(store, self.config.dedup_page_size).await;
        let mut accepted = Vec::new();

        for adapter in adapters {
            let stats = self.ingest_source(adapter.as_ref(), session, &mut dedup, &mut accepted).await;
            summary.sources.push((adapter.source_id(), stats));
        }

        for trade in &accepted {
            *summary.by_chamber.entry(trade.chamber).or_default() += 1;
            *summary.by_trade_type.entry(trade.trade_type).or_default() += 1;
        }

        if self.config.dry_run {
            log::info!("🧪 Dry run: {} trades accepted, nothing written", accepted.len());
            summary.preview = accepted.iter().take(self.config.preview_count).cloned().collect();
            return summary;
        }

        let outcome = self.loader.load(store, &accepted).await;
        for (source, inserted) in &outcome.inserted_by_source {
            if let Some(stats) = summary.source_mut(*source) {
                stats.inserted = *inserted;
            }
        }
        for failed in &outcome.failed {
            if let Some(stats) = summary.source_mut(failed.source) {
                stats.failed += 1;
            }
        }
        summary.conflicts = outcome.conflicts;
        summary.failed = outcome.failed;

        summary
    }

    async fn ingest_source(
        &self,
        adapter: &dyn SourceAdapter,
        session: &FetchSession,
        dedup: &mut DedupIndex,
        accepted: &mut Vec<CanonicalTrade>,
    ) -> SourceStats {
        let source = adapter.source_id();
        let limit = self.config.record_limit.unwrap_or(usize::MAX);
        log::info!("📡 [{}] Fetching...", source);

        let (tx, mut rx) = mpsc::channel(self.config.channel_buffer.max(1));
        let fetch = adapter.fetch(session, tx);

        let normalizer = &self.normalizer;
        // Owns rx: dropping it at the limit tells the adapter to stop
        let consume = async move {
            let mut stats = SourceStats::default();
            while stats.fetched < limit {
                let Some(raw) = rx.recv().await else { break };
                stats.fetched += 1;

                match normalizer.normalize(&raw) {
                    Err(reason) => {
                        log::debug!("[{}] rejected: {}", source, reason);
                        stats.rejected += 1;
                    }
                    Ok(trade) if dedup.admit(&trade) => {
                        stats.accepted += 1;
                        accepted.push(trade);
                    }
                    Ok(_) => stats.duplicates += 1,
                }
            }
            drop(rx);
            stats
        };

        let (result, mut stats) = tokio::join!(fetch, consume);

        match result {
            Ok(report) => {
                stats.skipped_items = report.failed_items;
                stats.stopped_early = report.stopped_early;
            }
            Err(e) => {
                log::warn!("⚠️  [{}] Source unavailable: {}", source, e);
                stats.unavailable = Some(e.to_string());
            }
        }

        log::info!(
            "✅ [{}] fetched: {} | rejected: {} | duplicates: {} | accepted: {}",
            source,
            stats.fetched,
            stats.rejected,
            stats.duplicates,
            stats.accepted
        );
        stats
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, "INGESTION SUMMARY{}", if self.dry_run { " (DRY RUN)" } else { "" })?;
        writeln!(f, "{}", rule)?;

        for (source, stats) in &self.sources {
            match &stats.unavailable {
                Some(reason) => writeln!(f, "  {:<15} unavailable: {}", source.as_str(), reason)?,
                None => writeln!(
                    f,
                    "  {:<15} fetched {:>6} | rejected {:>5} | dup {:>6} | accepted {:>6} | inserted {:>6} | failed {}{}",
                    source.as_str(),
                    stats.fetched,
                    stats.rejected,
                    stats.duplicates,
                    stats.accepted,
                    stats.inserted,
                    stats.failed,
                    if stats.stopped_early { " (limit)" } else { "" }
                )?,
            }
        }

        writeln!(f, "{}", "-".repeat(60))?;
        for (chamber, count) in &self.by_chamber {
            writeln!(f, "  {:<15} {}", chamber.as_str(), count)?;
        }
        for (trade_type, count) in &self.by_trade_type {
            writeln!(f, "  {:<15} {}", trade_type.as_str(), count)?;
        }
        writeln!(f, "  Fetched:        {}", self.total_fetched())?;
        writeln!(f, "  Accepted:       {}", self.total_accepted())?;
        if !self.dry_run {
            writeln!(f, "  Inserted:       {}", self.total_inserted())?;
            if self.conflicts > 0 {
                writeln!(f, "  Already stored: {}", self.conflicts)?;
            }
            writeln!(f, "  Failed:         {}", self.failed.len())?;
            for failed in &self.failed {
                writeln!(f, "    ✗ {}", failed)?;
            }
        }

        if !self.preview.is_empty() {
            writeln!(f, "{}", "-".repeat(60))?;
            writeln!(f, "  First {} trades:", self.preview.len())?;
            for trade in &self.preview {
                let amount = match (trade.amount_low, trade.amount_high) {
                    (Some(low), Some(high)) => format!("${}-${}", low, high),
                    (Some(low), None) => format!("${}+", low),
                    _ => "n/a".to_string(),
                };
                writeln!(
                    f,
                    "    {} | {} | {} | {} | {} | {}",
                    trade.member_name, trade.ticker, trade.trade_type, trade.trade_date, amount, trade.source
                )?;
            }
        }

        write!(f, "{}", rule)
    }
}
