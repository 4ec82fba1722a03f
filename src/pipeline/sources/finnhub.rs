//! Finnhub congressional trading
//!
//! The endpoint requires a `symbol` parameter, so the adapter walks a
//! configured ticker universe one request at a time through the Finnhub
//! rate limiter (free tier: 60 req/min). A failing ticker is logged and
//! skipped.

use super::{emit, FetchReport, FetchSession, HttpRequest, SourceAdapter};
use crate::pipeline::config::FinnhubConfig;
use crate::pipeline::error::SourceError;
use crate::pipeline::types::{RawRecord, SourceId};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta, Utc};
use serde_json::Value;
use tokio::sync::mpsc;

pub const DEFAULT_ENDPOINT: &str = "https://finnhub.io/api/v1/stock/congressional-trading";
pub const API_KEY_VAR: &str = "FINNHUB_API_KEY";

/// Tickers most traded by members of Congress
pub const POPULAR_TICKERS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "GOOG", "AMZN", "META", "NVDA", "TSLA",
    "AMD", "INTC", "AVGO", "QCOM", "CRM", "NFLX", "DIS", "CMCSA",
    "JPM", "BAC", "WFC", "GS", "MS", "V", "MA", "AXP",
    "XOM", "CVX", "COP", "OXY", "HAL", "SLB", "VLO", "PSX", "MPC",
    "LMT", "RTX", "NOC", "GD", "BA", "HII", "LHX",
    "UNH", "JNJ", "PFE", "MRK", "ABT", "TMO", "ISRG", "DXCM",
    "ABBV", "LLY", "BMY", "AMGN", "GILD", "REGN", "MRNA", "BNTX",
    "WMT", "COST", "TGT", "HD", "LOW", "SBUX", "MCD", "NKE",
    "BRK.B", "SPY", "QQQ", "IWM", "DIA",
    "RIVN", "RBLX", "PLTR", "SNOW", "NET", "CRWD", "ZS", "PANW",
    "F", "GM", "UBER", "ABNB", "SQ", "PYPL", "SHOP", "COIN",
    "T", "VZ", "TMUS",
    "SO", "NEE", "DUK", "AEP",
    "PG", "KO", "PEP",
    "CI", "HCA", "ELV",
    "CAT", "DE", "HON", "MMM", "GE",
];

pub struct FinnhubSource {
    config: FinnhubConfig,
}

impl FinnhubSource {
    pub fn new(config: FinnhubConfig) -> Self {
        Self { config }
    }

    fn request(&self, symbol: &str, api_key: &str) -> HttpRequest {
        let to = Utc::now().date_naive();
        let from = TimeDelta::try_days(self.config.lookback_days)
            .and_then(|lookback| to.checked_sub_signed(lookback))
            .unwrap_or(NaiveDate::MIN);

        HttpRequest::get(&self.config.endpoint)
            .query("symbol", symbol)
            .query("from", from.format("%Y-%m-%d"))
            .query("to", to.format("%Y-%m-%d"))
            .query("token", api_key)
    }
}

#[async_trait]
impl SourceAdapter for FinnhubSource {
    fn source_id(&self) -> SourceId {
        SourceId::Finnhub
    }

    async fn fetch(&self, session: &FetchSession, tx: mpsc::Sender<RawRecord>) -> Result<FetchReport, SourceError> {
        let api_key = self.config.api_key.as_deref().ok_or(SourceError::MissingCredential {
            source_id: self.source_id(),
            variable: API_KEY_VAR,
        })?;

        let symbols = &self.config.symbols;
        let interval = session
            .limiter(self.source_id())
            .map(|l| l.min_interval())
            .unwrap_or_default();
        log::info!(
            "📥 [finnhub] Fetching trades for {} tickers (~{}s at {}ms/request)",
            symbols.len(),
            interval
                .saturating_mul(u32::try_from(symbols.len()).unwrap_or(u32::MAX))
                .as_secs(),
            interval.as_millis()
        );

        let mut report = FetchReport::default();

        for (i, symbol) in symbols.iter().enumerate() {
            report.requests += 1;
            let request = self.request(symbol, api_key);

            let document = match session.get_json(self.source_id(), symbol, &request).await {
                Ok(document) => document,
                Err(e) => {
                    log::warn!("⚠️  [finnhub] [{}/{}] {}: {}", i + 1, symbols.len(), symbol, e);
                    report.failed_items += 1;
                    continue;
                }
            };

            let items: Vec<Value> = match document {
                Value::Object(mut map) => match map.remove("data") {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                },
                _ => {
                    log::warn!("⚠️  [finnhub] {}: unexpected response shape", symbol);
                    report.failed_items += 1;
                    continue;
                }
            };

            // The queried ticker is authoritative when the record omits it
            let items: Vec<Value> = items
                .into_iter()
                .map(|mut item| {
                    if let Value::Object(ref mut fields) = item {
                        let missing = fields.get("symbol").and_then(Value::as_str).map_or(true, |s| s.trim().is_empty());
                        if missing {
                            fields.insert("symbol".to_string(), Value::String(symbol.clone()));
                        }
                    }
                    item
                })
                .collect();

            let count = items.len();
            if !emit(self.source_id(), items, &tx, &mut report).await {
                log::info!("⏹️  [finnhub] Record limit reached at {}", symbol);
                return Ok(report);
            }

            if i % 10 == 0 {
                log::info!(
                    "   ├─ [{}/{}] {}: {} trades | Total: {}",
                    i + 1,
                    symbols.len(),
                    symbol,
                    count,
                    report.records
                );
            }
        }

        if report.requests > 0 && report.failed_items == report.requests {
            return Err(SourceError::Unavailable {
                source_id: self.source_id(),
                reason: format!("all {} ticker requests failed", report.requests),
            });
        }

        log::info!("✅ [finnhub] {} records, {} tickers skipped", report.records, report.failed_items);
        Ok(report)
    }
}
