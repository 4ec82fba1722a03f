//! Store-wide statistics for `--stats`

use super::db::TradeStore;
use chrono::NaiveDate;
use std::fmt;

/// Snapshot of what is already persisted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub house: usize,
    pub senate: usize,
    pub unknown_chamber: usize,
    /// Oldest and newest `trade_date`, `None` when the table is empty
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub unique_members: usize,
    pub unique_tickers: usize,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, "DATABASE STATS")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "  Total trades:   {}", self.total)?;
        writeln!(f, "  House trades:   {}", self.house)?;
        writeln!(f, "  Senate trades:  {}", self.senate)?;
        if self.unknown_chamber > 0 {
            writeln!(f, "  Unknown:        {}", self.unknown_chamber)?;
        }
        if let Some((oldest, newest)) = self.date_range {
            writeln!(f, "  Date range:     {} to {}", oldest, newest)?;
        }
        writeln!(f, "  Unique members: {}", self.unique_members)?;
        writeln!(f, "  Unique tickers: {}", self.unique_tickers)?;
        write!(f, "{}", rule)
    }
}

/// Stats printed after a completed run
///
/// The run's writes are already committed, so a failing read here is only
/// logged and never changes the exit status.
pub async fn post_run_stats<S: TradeStore + ?Sized>(store: &S) -> Option<StoreStats> {
    match store.stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            log::warn!("⚠️  Could not read database stats after run: {}", e);
            None
        }
    }
}
