//! Chunked writer with per-record fallback

use super::db::TradeStore;
use super::types::{CanonicalTrade, SourceId};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// A trade that could not be written even on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    pub member_name: String,
    pub ticker: String,
    pub trade_date: NaiveDate,
    pub source: SourceId,
    pub error: String,
}

impl fmt::Display for FailedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} ({}): {}",
            self.member_name, self.ticker, self.trade_date, self.source, self.error
        )
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub inserted: usize,
    /// Rows the store already had (uniqueness conflict absorbed)
    pub conflicts: usize,
    pub failed: Vec<FailedRecord>,
    pub inserted_by_source: BTreeMap<SourceId, usize>,
}

impl LoadOutcome {
    fn record(&mut self, trade: &CanonicalTrade, inserted: bool) {
        if inserted {
            self.inserted += 1;
            *self.inserted_by_source.entry(trade.source).or_default() += 1;
        } else {
            self.conflicts += 1;
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchLoader {
    chunk_size: usize,
}

impl Default for BatchLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl BatchLoader {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Write `trades` chunk by chunk
    ///
    /// A failing chunk is replayed one record at a time so a single bad
    /// record cannot sink its neighbours. Records failing alone are
    /// reported and not retried.
    pub async fn load(&self, store: &dyn TradeStore, trades: &[CanonicalTrade]) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();
        if trades.is_empty() {
            log::info!("📭 No trades to load");
            return outcome;
        }

        let chunks = trades.len().div_ceil(self.chunk_size);
        log::info!("💾 Loading {} trades in {} chunks of {}", trades.len(), chunks, self.chunk_size);

        for (i, chunk) in trades.chunks(self.chunk_size).enumerate() {
            match store.insert_trades(chunk).await {
                Ok(flags) => {
                    for (trade, inserted) in chunk.iter().zip(flags) {
                        outcome.record(trade, inserted);
                    }
                }
                Err(e) => {
                    log::warn!("⚠️  Chunk {}/{} failed ({}), inserting one by one", i + 1, chunks, e);
                    self.load_individually(store, chunk, &mut outcome).await;
                }
            }

            if (i + 1) % 10 == 0 {
                log::info!("   ├─ {}/{} chunks | Inserted: {}", i + 1, chunks, outcome.inserted);
            }
        }

        log::info!(
            "✅ Loaded {} trades ({} already present, {} failed)",
            outcome.inserted,
            outcome.conflicts,
            outcome.failed.len()
        );
        outcome
    }

    async fn load_individually(&self, store: &dyn TradeStore, chunk: &[CanonicalTrade], outcome: &mut LoadOutcome) {
        for trade in chunk {
            match store.insert_trades(std::slice::from_ref(trade)).await {
                Ok(flags) => outcome.record(trade, flags.first().copied().unwrap_or(false)),
                Err(e) => {
                    log::warn!(
                        "❌ Failed: {} | {} | {}: {}",
                        trade.member_name,
                        trade.ticker,
                        trade.trade_date,
                        e
                    );
                    outcome.failed.push(FailedRecord {
                        member_name: trade.member_name.clone(),
                        ticker: trade.ticker.clone(),
                        trade_date: trade.trade_date,
                        source: trade.source,
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::StoreError;
    use crate::pipeline::stats::StoreStats;
    use crate::pipeline::types::{DedupKey, TradeType};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Rejects any write containing a "BAD" ticker, like a CHECK constraint
    #[derive(Default)]
    struct PickyStore {
        rows: Mutex<HashSet<DedupKey>>,
        writes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl TradeStore for PickyStore {
        async fn list_dedup_keys(&self, _offset: usize, _limit: usize) -> Result<Vec<DedupKey>, StoreError> {
            Ok(Vec::new())
        }

        async fn insert_trades(&self, trades: &[CanonicalTrade]) -> Result<Vec<bool>, StoreError> {
            self.writes.lock().unwrap().push(trades.len());
            if trades.iter().any(|t| t.ticker == "BAD") {
                return Err(StoreError::CorruptRow("CHECK constraint failed: ticker".to_string()));
            }
            let mut rows = self.rows.lock().unwrap();
            Ok(trades.iter().map(|t| rows.insert(t.dedup_key())).collect())
        }

        async fn stats(&self) -> Result<StoreStats, StoreError> {
            Ok(StoreStats::default())
        }
    }

    fn trades(tickers: &[&str]) -> Vec<CanonicalTrade> {
        tickers
            .iter()
            .map(|t| CanonicalTrade::sample("Ro Khanna", t, "2024-02-14", TradeType::Purchase))
            .collect()
    }

    #[tokio::test]
    async fn test_chunks_written_whole() {
        let store = PickyStore::default();
        let outcome = BatchLoader::new(2).load(&store, &trades(&["A", "B", "C", "D", "E"])).await;

        assert_eq!(outcome.inserted, 5);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.inserted_by_source.get(&SourceId::HouseStockWatcher), Some(&5));
        assert_eq!(*store.writes.lock().unwrap(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_bad_record_isolated_within_chunk() {
        let store = PickyStore::default();
        let outcome = BatchLoader::new(3).load(&store, &trades(&["A", "BAD", "C", "D"])).await;

        assert_eq!(outcome.inserted, 3);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].ticker, "BAD");
        assert_eq!(outcome.failed[0].member_name, "Ro Khanna");
        assert!(outcome.failed[0].error.contains("CHECK"));
        // Failed chunk of 3, then 3 single writes, then the last chunk
        assert_eq!(*store.writes.lock().unwrap(), vec![3, 1, 1, 1, 1]);
    }

    #[tokio::test]
    async fn test_existing_rows_counted_as_conflicts() {
        let store = PickyStore::default();
        let batch = trades(&["A", "B"]);
        BatchLoader::default().load(&store, &batch).await;

        let outcome = BatchLoader::default().load(&store, &batch).await;
        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.conflicts, 2);
        assert!(outcome.inserted_by_source.is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_writes_nothing() {
        let store = PickyStore::default();
        let outcome = BatchLoader::default().load(&store, &[]).await;
        assert_eq!(outcome, LoadOutcome::default());
        assert!(store.writes.lock().unwrap().is_empty());
    }
}
