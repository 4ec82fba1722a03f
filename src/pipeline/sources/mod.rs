//! Source adapters
//!
//! Each adapter translates one upstream provider into `RawRecord`s tagged
//! with its `SourceId`. Records are pushed into a bounded channel as they are
//! decoded, so the orchestrator consumes them lazily. Every `fetch` call is a
//! fresh fetch.
//!
//! | Adapter | Shape | Rate limited |
//! |---|---|---|
//! | `HouseStockWatcherSource` | bulk document | no |
//! | `QuiverSource` | bulk document, token auth | no |
//! | `FinnhubSource` | one request per ticker | yes |
//! | `CapitolTradesSource` | paginated | yes |

pub mod capitol_trades;
pub mod finnhub;
pub mod house_stock_watcher;
pub mod quiver;

pub use capitol_trades::CapitolTradesSource;
pub use finnhub::FinnhubSource;
pub use house_stock_watcher::HouseStockWatcherSource;
pub use quiver::QuiverSource;

use super::config::PipelineConfig;
use super::error::SourceError;
use super::rate_limiter::{RateLimiter, RetryPolicy};
use super::types::{RawRecord, SourceId};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const USER_AGENT: &str = "CongressTradeTracker/1.0 (research project)";

/// Minimal HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Map status to the error taxonomy, then decode the body as JSON
    pub fn into_json(self, url: &str) -> Result<Value, SourceError> {
        match self.status {
            429 => Err(SourceError::RateLimited(url.to_string())),
            _ if !self.is_success() => Err(SourceError::Http {
                status: self.status,
                url: url.to_string(),
            }),
            _ => Ok(serde_json::from_str(&self.body)?),
        }
    }
}

/// One GET request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: impl ToString) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// Query value by key
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP seam used by every adapter
///
/// Non-success statuses are returned as responses, not errors; only
/// network-level failures produce `Err`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, SourceError>;
}

/// `reqwest` implementation of `HttpTransport`
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, SourceError> {
        let mut builder = self
            .client
            .get(&request.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&request.query);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}

/// Per-run fetch state handed to every adapter call
///
/// Owns the HTTP client and the per-provider rate limiters. Dropping the
/// session releases the connection pool, whichever way the run ends.
pub struct FetchSession {
    transport: Arc<dyn HttpTransport>,
    finnhub_limiter: RateLimiter,
    capitol_limiter: RateLimiter,
}

impl FetchSession {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        finnhub_limiter: RateLimiter,
        capitol_limiter: RateLimiter,
    ) -> Self {
        Self {
            transport,
            finnhub_limiter,
            capitol_limiter,
        }
    }

    /// Build a session with a `reqwest` client and configured limiters
    pub fn from_config(config: &PipelineConfig) -> Result<Self, SourceError> {
        let transport = Arc::new(ReqwestTransport::new(config.http_timeout)?);
        Ok(Self::with_transport(transport, config))
    }

    /// Configured limiters around a caller-supplied transport
    pub fn with_transport(transport: Arc<dyn HttpTransport>, config: &PipelineConfig) -> Self {
        let policy = RetryPolicy::rate_limit(config.rate_limit_cool_down);
        Self::new(
            transport,
            RateLimiter::new(config.finnhub.min_interval, policy),
            RateLimiter::new(config.capitol_trades.min_interval, policy),
        )
    }

    pub fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    /// Limiter for a provider; bulk providers are not throttled
    pub fn limiter(&self, source: SourceId) -> Option<&RateLimiter> {
        match source {
            SourceId::Finnhub => Some(&self.finnhub_limiter),
            SourceId::CapitolTrades => Some(&self.capitol_limiter),
            SourceId::HouseStockWatcher | SourceId::Quiver => None,
        }
    }

    /// GET and decode JSON, through the provider's limiter when it has one
    pub async fn get_json(&self, source: SourceId, label: &str, request: &HttpRequest) -> Result<Value, SourceError> {
        let transport = self.transport.as_ref();
        let send = || async move { transport.get(request).await?.into_json(&request.url) };

        match self.limiter(source) {
            Some(limiter) => limiter.execute(label, send).await,
            None => send().await,
        }
    }
}

/// Outcome of one adapter fetch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Requests issued, retries excluded
    pub requests: usize,
    /// Items (tickers, pages, endpoints) skipped after failing
    pub failed_items: usize,
    /// Records handed to the channel
    pub records: usize,
    /// Receiver hung up before the source was exhausted (record cap)
    pub stopped_early: bool,
}

/// Common adapter capability
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> SourceId;

    /// Stream every record of this source into `tx`
    ///
    /// `Err` means the whole source was unusable (missing credential,
    /// unreachable host) and contributed nothing. Item-level failures are
    /// counted in the report instead.
    async fn fetch(&self, session: &FetchSession, tx: mpsc::Sender<RawRecord>) -> Result<FetchReport, SourceError>;
}

/// Build the adapters for the selected sources, in the given order
pub fn build_adapters(config: &PipelineConfig, sources: &[SourceId]) -> Vec<Box<dyn SourceAdapter>> {
    sources
        .iter()
        .map(|source| -> Box<dyn SourceAdapter> {
            match source {
                SourceId::HouseStockWatcher => Box::new(HouseStockWatcherSource::new(config.house_stock_watcher.urls.clone())),
                SourceId::Quiver => Box::new(QuiverSource::new(config.quiver.endpoints.clone(), config.quiver.api_key.clone())),
                SourceId::Finnhub => Box::new(FinnhubSource::new(config.finnhub.clone())),
                SourceId::CapitolTrades => Box::new(CapitolTradesSource::new(config.capitol_trades.clone())),
            }
        })
        .collect()
}

/// Pull the record array out of a provider document
///
/// Accepts a bare array or an object wrapping it under `data` or
/// `transactions`.
pub(crate) fn record_array(document: Value) -> Option<Vec<Value>> {
    match document {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => ["data", "transactions"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            }),
        _ => None,
    }
}

/// Send records until the receiver hangs up
///
/// Returns `false` when the receiver is gone.
pub(crate) async fn emit(
    source: SourceId,
    items: Vec<Value>,
    tx: &mpsc::Sender<RawRecord>,
    report: &mut FetchReport,
) -> bool {
    for item in items {
        let Some(record) = RawRecord::from_value(source, item) else {
            log::debug!("{}: skipping non-object record", source);
            continue;
        };
        if tx.send(record).await.is_err() {
            report.stopped_early = true;
            return false;
        }
        report.records += 1;
    }
    true
}
