//! Pipeline configuration from environment variables

use super::error::ConfigError;
use super::sources::{capitol_trades, finnhub, house_stock_watcher, quiver};
use std::env;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for any throttle interval or cool-down
const MAX_WAIT_SECS: u64 = 3_600;

/// Upper bound for `FINNHUB_LOOKBACK_DAYS` (about a century)
const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// House Stock Watcher mirrors, tried in order
#[derive(Debug, Clone)]
pub struct HouseStockWatcherConfig {
    pub urls: Vec<String>,
}

/// Quiver endpoints and credential
#[derive(Debug, Clone)]
pub struct QuiverConfig {
    pub endpoints: Vec<String>,
    pub api_key: Option<String>,
}

/// Finnhub per-ticker loop settings
#[derive(Debug, Clone)]
pub struct FinnhubConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    /// Ticker universe queried one request at a time
    pub symbols: Vec<String>,
    /// `from` = today minus this many days
    pub lookback_days: i64,
    pub min_interval: Duration,
}

/// Capitol Trades pagination settings
#[derive(Debug, Clone)]
pub struct CapitolTradesConfig {
    pub endpoint: String,
    pub page_size: usize,
    /// Safety cap on pages requested per run
    pub max_pages: usize,
    pub min_interval: Duration,
}

/// Configuration for one ingestion run
///
/// Loaded from environment variables with sensible defaults. Only
/// `TRADES_DB_PATH` is required.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Directory of `.sql` migration files
    pub schema_dir: String,

    /// Per-request HTTP timeout
    pub http_timeout: Duration,

    /// Pause after a rate-limit response before the single retry
    pub rate_limit_cool_down: Duration,

    /// Records per insert chunk
    pub batch_size: usize,

    /// Page size when reading existing dedup keys
    pub dedup_page_size: usize,

    /// Bounded channel between an adapter and the orchestrator
    pub channel_buffer: usize,

    pub house_stock_watcher: HouseStockWatcherConfig,
    pub quiver: QuiverConfig,
    pub finnhub: FinnhubConfig,
    pub capitol_trades: CapitolTradesConfig,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `TRADES_DB_PATH` (required)
    /// - `SQL_SCHEMA_DIR` (default: sql)
    /// - `FINNHUB_API_KEY`, `QUIVER_API_KEY` (optional; sources without one are skipped)
    /// - `FINNHUB_SYMBOLS` (comma-separated, default: built-in list)
    /// - `FINNHUB_LOOKBACK_DAYS` (default: 730)
    /// - `FINNHUB_MIN_INTERVAL_MS` (default: 1100)
    /// - `CAPITOL_TRADES_MIN_INTERVAL_MS` (default: 1000)
    /// - `CAPITOL_TRADES_PAGE_SIZE` (default: 100)
    /// - `CAPITOL_TRADES_MAX_PAGES` (default: 50)
    /// - `RATE_LIMIT_COOLDOWN_SECS` (default: 60)
    /// - `HTTP_TIMEOUT_SECS` (default: 30)
    /// - `BATCH_SIZE` (default: 50)
    /// - `DEDUP_PAGE_SIZE` (default: 1000)
    /// - `SOURCE_CHANNEL_BUFFER` (default: 1000)
    ///
    /// Lookback is limited to 1..=36500 days and every wait (intervals,
    /// cool-down, timeout) to one hour.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let db_path = var("TRADES_DB_PATH").ok_or_else(|| ConfigError::MissingVariable("TRADES_DB_PATH".to_string()))?;

        let symbols = var("FINNHUB_SYMBOLS")
            .map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_uppercase())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|| finnhub::POPULAR_TICKERS.iter().map(|t| t.to_string()).collect());

        Ok(Self {
            db_path,
            schema_dir: var("SQL_SCHEMA_DIR").unwrap_or_else(|| "sql".to_string()),
            http_timeout: Duration::from_secs(bounded(&var, "HTTP_TIMEOUT_SECS", 30, 1..=MAX_WAIT_SECS)?),
            rate_limit_cool_down: Duration::from_secs(bounded(&var, "RATE_LIMIT_COOLDOWN_SECS", 60, 0..=MAX_WAIT_SECS)?),
            batch_size: positive(&var, "BATCH_SIZE", 50)?,
            dedup_page_size: positive(&var, "DEDUP_PAGE_SIZE", 1_000)?,
            channel_buffer: positive(&var, "SOURCE_CHANNEL_BUFFER", 1_000)?,

            house_stock_watcher: HouseStockWatcherConfig {
                urls: house_stock_watcher::DEFAULT_URLS.iter().map(|u| u.to_string()).collect(),
            },

            quiver: QuiverConfig {
                endpoints: quiver::DEFAULT_ENDPOINTS.iter().map(|u| u.to_string()).collect(),
                api_key: var(quiver::API_KEY_VAR),
            },

            finnhub: FinnhubConfig {
                api_key: var(finnhub::API_KEY_VAR),
                endpoint: finnhub::DEFAULT_ENDPOINT.to_string(),
                symbols,
                lookback_days: bounded(&var, "FINNHUB_LOOKBACK_DAYS", 730, 1..=MAX_LOOKBACK_DAYS)?,
                min_interval: interval_ms(&var, "FINNHUB_MIN_INTERVAL_MS", 1_100)?,
            },

            capitol_trades: CapitolTradesConfig {
                endpoint: capitol_trades::DEFAULT_ENDPOINT.to_string(),
                page_size: positive(&var, "CAPITOL_TRADES_PAGE_SIZE", 100)?,
                max_pages: positive(&var, "CAPITOL_TRADES_MAX_PAGES", 50)?,
                min_interval: interval_ms(&var, "CAPITOL_TRADES_MIN_INTERVAL_MS", 1_000)?,
            },
        })
    }
}

fn parse_or<T, V>(var: &V, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{}={}", key, raw))),
        None => Ok(default),
    }
}

fn positive<V>(var: &V, key: &str, default: usize) -> Result<usize, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    match parse_or(var, key, default)? {
        0 => Err(ConfigError::InvalidValue(format!("{} must be greater than zero", key))),
        n => Ok(n),
    }
}

/// `parse_or` that also rejects values outside `range`
fn bounded<T, V>(var: &V, key: &str, default: T, range: RangeInclusive<T>) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Display,
    V: Fn(&str) -> Option<String>,
{
    let value = parse_or(var, key, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue(format!(
            "{}={} (expected {}..={})",
            key,
            value,
            range.start(),
            range.end()
        )))
    }
}

fn interval_ms<V>(var: &V, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    bounded(var, key, default, 0..=MAX_WAIT_SECS * 1_000).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<PipelineConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        PipelineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[("TRADES_DB_PATH", "/tmp/trades.db")]).unwrap();

        assert_eq!(config.db_path, "/tmp/trades.db");
        assert_eq!(config.schema_dir, "sql");
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.rate_limit_cool_down, Duration::from_secs(60));
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.dedup_page_size, 1_000);
        assert_eq!(config.channel_buffer, 1_000);
        assert_eq!(config.finnhub.symbols.len(), finnhub::POPULAR_TICKERS.len());
        assert_eq!(config.finnhub.lookback_days, 730);
        assert_eq!(config.finnhub.min_interval, Duration::from_millis(1_100));
        assert_eq!(config.finnhub.api_key, None);
        assert_eq!(config.quiver.api_key, None);
        assert_eq!(config.capitol_trades.page_size, 100);
        assert_eq!(config.capitol_trades.max_pages, 50);
        assert_eq!(config.house_stock_watcher.urls.len(), 2);
    }

    #[test]
    fn test_custom_config() {
        let config = config_from(&[
            ("TRADES_DB_PATH", "/data/congress.db"),
            ("FINNHUB_API_KEY", "fh-key"),
            ("QUIVER_API_KEY", "  qv-key  "),
            ("FINNHUB_SYMBOLS", "aapl, msft,,nvda"),
            ("BATCH_SIZE", "25"),
            ("RATE_LIMIT_COOLDOWN_SECS", "5"),
        ])
        .unwrap();

        assert_eq!(config.finnhub.api_key.as_deref(), Some("fh-key"));
        assert_eq!(config.quiver.api_key.as_deref(), Some("qv-key"));
        assert_eq!(config.finnhub.symbols, vec!["AAPL", "MSFT", "NVDA"]);
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.rate_limit_cool_down, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_db_path() {
        assert_eq!(
            config_from(&[]).unwrap_err(),
            ConfigError::MissingVariable("TRADES_DB_PATH".to_string())
        );
        // Blank counts as missing
        assert!(config_from(&[("TRADES_DB_PATH", "  ")]).is_err());
    }

    #[test]
    fn test_invalid_values() {
        let err = config_from(&[("TRADES_DB_PATH", "x.db"), ("BATCH_SIZE", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(msg) if msg.contains("BATCH_SIZE")));

        let err = config_from(&[("TRADES_DB_PATH", "x.db"), ("CAPITOL_TRADES_PAGE_SIZE", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_out_of_range_values() {
        for (key, value) in [
            ("FINNHUB_LOOKBACK_DAYS", "200000000"),
            ("FINNHUB_LOOKBACK_DAYS", "-5"),
            ("FINNHUB_LOOKBACK_DAYS", "0"),
            ("FINNHUB_MIN_INTERVAL_MS", "18446744073709551615"),
            ("CAPITOL_TRADES_MIN_INTERVAL_MS", "3600001"),
            ("RATE_LIMIT_COOLDOWN_SECS", "99999999"),
            ("HTTP_TIMEOUT_SECS", "0"),
        ] {
            let err = config_from(&[("TRADES_DB_PATH", "x.db"), (key, value)]).unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidValue(msg) if msg.contains(key)),
                "{}={} gave {:?}",
                key,
                value,
                err
            );
        }

        let config = config_from(&[
            ("TRADES_DB_PATH", "x.db"),
            ("FINNHUB_LOOKBACK_DAYS", "36500"),
            ("FINNHUB_MIN_INTERVAL_MS", "0"),
        ])
        .unwrap();
        assert_eq!(config.finnhub.lookback_days, 36_500);
        assert_eq!(config.finnhub.min_interval, Duration::ZERO);
    }
}
