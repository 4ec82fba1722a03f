//! Trade store trait and SQLite implementation
//!
//! Schema lives in `/sql/*.sql` and is applied by `run_schema_migrations`.

use super::error::StoreError;
use super::stats::StoreStats;
use super::types::{CanonicalTrade, DedupKey, TradeType};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Persistence boundary for canonical trades
///
/// Table written (see `/sql/01_congressional_trades.sql`):
/// - `congressional_trades` - INSERT ... ON CONFLICT DO NOTHING on the dedup key
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// One page of existing dedup keys, in insertion order
    async fn list_dedup_keys(&self, offset: usize, limit: usize) -> Result<Vec<DedupKey>, StoreError>;

    /// Insert a chunk atomically
    ///
    /// Returns one flag per trade: `true` if a row was written, `false` if
    /// the dedup key already existed. Any other failure (constraint
    /// violation, I/O) rolls back the whole chunk and returns `Err`.
    async fn insert_trades(&self, trades: &[CanonicalTrade]) -> Result<Vec<bool>, StoreError>;

    /// Aggregate counts over the whole table
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// Run schema migrations from SQL files
///
/// Reads all .sql files from `schema_dir` in filename order and executes
/// them. Files must use "IF NOT EXISTS" clauses so re-runs are no-ops.
pub fn run_schema_migrations(conn: &mut Connection, schema_dir: &str) -> Result<(), StoreError> {
    let schema_path = Path::new(schema_dir);

    if !schema_path.exists() {
        return Err(StoreError::Schema(format!("Schema directory not found: {}", schema_dir)));
    }

    conn.pragma_update(None, "journal_mode", "WAL")?;
    log::info!("📊 Enabled WAL mode for SQLite database");

    // 00_, 01_, 02_ ... ordering
    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();

    sql_files.sort_by_key(|entry| entry.file_name());

    log::info!("🔧 Running schema migrations from: {}", schema_dir);

    for entry in sql_files {
        let path = entry.path();
        let filename = entry.file_name().to_string_lossy().into_owned();

        log::info!("   ├─ Executing: {}", filename);
        let sql_content = fs::read_to_string(&path)?;
        conn.execute_batch(&sql_content)
            .map_err(|e| StoreError::Schema(format!("{}: {}", filename, e)))?;
    }

    log::info!("✅ All schema migrations completed successfully");

    Ok(())
}

/// SQLite implementation of `TradeStore`
///
/// Single connection behind a mutex; the pipeline has one writer.
pub struct SqliteTradeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTradeStore {
    /// Open (or create) the database file
    ///
    /// Does NOT create the schema; call `run_migrations` first.
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn run_migrations(&self, schema_dir: &str) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        run_schema_migrations(&mut conn, schema_dir)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn parse_key(member_name: String, ticker: String, trade_date: String, trade_type: String) -> Result<DedupKey, StoreError> {
        let trade_date = NaiveDate::parse_from_str(&trade_date, DATE_FORMAT)
            .map_err(|_| StoreError::CorruptRow(format!("trade_date '{}'", trade_date)))?;
        let trade_type: TradeType = trade_type.parse().map_err(StoreError::CorruptRow)?;

        Ok(DedupKey {
            member_name,
            ticker,
            trade_date,
            trade_type,
        })
    }
}

#[async_trait]
impl TradeStore for SqliteTradeStore {
    async fn list_dedup_keys(&self, offset: usize, limit: usize) -> Result<Vec<DedupKey>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT member_name, ticker, trade_date, trade_type
             FROM congressional_trades
             ORDER BY id
             LIMIT ? OFFSET ?",
        )?;

        let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut keys = Vec::new();
        for row in rows {
            let (member_name, ticker, trade_date, trade_type) = row?;
            keys.push(Self::parse_key(member_name, ticker, trade_date, trade_type)?);
        }
        Ok(keys)
    }

    async fn insert_trades(&self, trades: &[CanonicalTrade]) -> Result<Vec<bool>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let created_at = Utc::now().timestamp();

        let mut inserted = Vec::with_capacity(trades.len());
        {
            // ON CONFLICT (not OR IGNORE) so CHECK violations still fail
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO congressional_trades (
                    member_name, chamber, party, state,
                    ticker, company_name, asset_type, trade_type,
                    amount_low, amount_high, trade_date, disclosure_date,
                    source, source_url, raw_data, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT DO NOTHING
                "#,
            )?;

            for trade in trades {
                let changed = stmt.execute(params![
                    trade.member_name,
                    trade.chamber.as_str(),
                    trade.party,
                    trade.state,
                    trade.ticker,
                    trade.company_name,
                    trade.asset_type,
                    trade.trade_type.as_str(),
                    trade.amount_low,
                    trade.amount_high,
                    trade.trade_date.format(DATE_FORMAT).to_string(),
                    trade.disclosure_date.map(|d| d.format(DATE_FORMAT).to_string()),
                    trade.source.as_str(),
                    trade.source_url,
                    trade.raw_data,
                    created_at,
                ])?;
                inserted.push(changed == 1);
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.lock()?;

        let (total, house, senate, unknown_chamber, oldest, newest, unique_members, unique_tickers) = conn.query_row(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(chamber = 'House'), 0),
                COALESCE(SUM(chamber = 'Senate'), 0),
                COALESCE(SUM(chamber = 'Unknown'), 0),
                MIN(trade_date),
                MAX(trade_date),
                COUNT(DISTINCT member_name),
                COUNT(DISTINCT ticker)
            FROM congressional_trades
            "#,
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            },
        )?;

        let parse = |raw: String| {
            NaiveDate::parse_from_str(&raw, DATE_FORMAT)
                .map_err(|_| StoreError::CorruptRow(format!("trade_date '{}'", raw)))
        };
        let date_range = match (oldest, newest) {
            (Some(oldest), Some(newest)) => Some((parse(oldest)?, parse(newest)?)),
            _ => None,
        };

        Ok(StoreStats {
            total: total as usize,
            house: house as usize,
            senate: senate as usize,
            unknown_chamber: unknown_chamber as usize,
            date_range,
            unique_members: unique_members as usize,
            unique_tickers: unique_tickers as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Chamber;
    use tempfile::NamedTempFile;

    const SCHEMA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/sql");

    /// Helper to create a migrated test database
    fn create_test_store() -> Result<(NamedTempFile, SqliteTradeStore), Box<dyn std::error::Error>> {
        let temp_file = NamedTempFile::new()?;
        let db_path = temp_file.path().to_str().ok_or("non-utf8 temp path")?;

        let store = SqliteTradeStore::new(db_path)?;
        store.run_migrations(SCHEMA_DIR)?;

        Ok((temp_file, store))
    }

    fn count_rows(store: &SqliteTradeStore) -> i64 {
        let conn = store.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM congressional_trades", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let (_temp, store) = create_test_store().unwrap();
        store.run_migrations(SCHEMA_DIR).unwrap();
        assert_eq!(count_rows(&store), 0);
    }

    #[test]
    fn test_missing_schema_dir() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteTradeStore::new(temp_file.path().to_str().unwrap()).unwrap();

        let err = store.run_migrations("/nonexistent/schema/dir").unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
    }

    #[tokio::test]
    async fn test_insert_reports_conflicts() {
        let (_temp, store) = create_test_store().unwrap();

        let first = CanonicalTrade::sample("Nancy Pelosi", "NVDA", "2024-01-02", TradeType::Purchase);
        let other = CanonicalTrade::sample("Nancy Pelosi", "NVDA", "2024-01-02", TradeType::Sale);
        let inserted = store.insert_trades(&[first.clone(), other]).await.unwrap();
        assert_eq!(inserted, vec![true, true]);

        // Same key again, with a different source and amount
        let mut again = first.clone();
        again.amount_high = Some(50_000);
        let inserted = store.insert_trades(&[again]).await.unwrap();
        assert_eq!(inserted, vec![false]);
        assert_eq!(count_rows(&store), 2);
    }

    #[tokio::test]
    async fn test_constraint_violation_rolls_back_chunk() {
        let (_temp, store) = create_test_store().unwrap();

        let good = CanonicalTrade::sample("Dan Crenshaw", "MSFT", "2024-03-01", TradeType::Sale);
        let mut bad = CanonicalTrade::sample("Dan Crenshaw", "AAPL", "2024-03-01", TradeType::Sale);
        bad.ticker = "WAYTOOLONGTICKER".to_string();

        let result = store.insert_trades(&[good.clone(), bad]).await;
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
        assert_eq!(count_rows(&store), 0);

        // Alone, the good record goes through
        assert_eq!(store.insert_trades(&[good]).await.unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn test_list_dedup_keys_pages() {
        let (_temp, store) = create_test_store().unwrap();

        let trades: Vec<_> = ["AAPL", "MSFT", "NVDA", "TSLA", "AMZN"]
            .iter()
            .map(|t| CanonicalTrade::sample("Tommy Tuberville", t, "2023-11-20", TradeType::Purchase))
            .collect();
        store.insert_trades(&trades).await.unwrap();

        let page1 = store.list_dedup_keys(0, 2).await.unwrap();
        let page3 = store.list_dedup_keys(4, 2).await.unwrap();

        assert_eq!(page1.len(), 2);
        assert_eq!(page1[0], trades[0].dedup_key());
        assert_eq!(page3.len(), 1);
        assert_eq!(page3[0].ticker, "AMZN");
        assert!(store.list_dedup_keys(5, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats() {
        let (_temp, store) = create_test_store().unwrap();
        assert_eq!(store.stats().await.unwrap(), StoreStats::default());

        let mut senate = CanonicalTrade::sample("Tommy Tuberville", "AAPL", "2023-11-20", TradeType::Purchase);
        senate.chamber = Chamber::Senate;
        let trades = vec![
            CanonicalTrade::sample("Nancy Pelosi", "NVDA", "2024-01-02", TradeType::Purchase),
            CanonicalTrade::sample("Nancy Pelosi", "AAPL", "2022-06-15", TradeType::Sale),
            senate,
        ];
        store.insert_trades(&trades).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.house, 2);
        assert_eq!(stats.senate, 1);
        assert_eq!(stats.unique_members, 2);
        assert_eq!(stats.unique_tickers, 2);
        assert_eq!(
            stats.date_range,
            Some((
                NaiveDate::from_ymd_opt(2022, 6, 15).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
            ))
        );
    }
}
