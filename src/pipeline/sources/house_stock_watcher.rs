//! House Stock Watcher bulk dataset
//!
//! The whole House transaction history is one JSON document. Mirrors are
//! tried in order until one answers; no authentication or throttling.

use super::{emit, record_array, FetchReport, FetchSession, HttpRequest, SourceAdapter};
use crate::pipeline::error::SourceError;
use crate::pipeline::types::{RawRecord, SourceId};
use async_trait::async_trait;
use tokio::sync::mpsc;

pub const DEFAULT_URLS: &[&str] = &[
    "https://house-stock-watcher-data.s3-us-west-2.amazonaws.com/data/all_transactions.json",
    "https://housestockwatcher.com/api",
];

pub struct HouseStockWatcherSource {
    urls: Vec<String>,
}

impl HouseStockWatcherSource {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }
}

impl Default for HouseStockWatcherSource {
    fn default() -> Self {
        Self::new(DEFAULT_URLS.iter().map(|u| u.to_string()).collect())
    }
}

#[async_trait]
impl SourceAdapter for HouseStockWatcherSource {
    fn source_id(&self) -> SourceId {
        SourceId::HouseStockWatcher
    }

    async fn fetch(&self, session: &FetchSession, tx: mpsc::Sender<RawRecord>) -> Result<FetchReport, SourceError> {
        let mut report = FetchReport::default();
        let mut last_error = String::from("no URLs configured");

        for url in &self.urls {
            log::info!("📥 [hsw] Trying: {}", url);
            report.requests += 1;

            let document = match session.get_json(self.source_id(), url, &HttpRequest::get(url)).await {
                Ok(document) => document,
                Err(e) => {
                    log::warn!("⚠️  [hsw] {} failed: {}, trying next...", url, e);
                    report.failed_items += 1;
                    last_error = e.to_string();
                    continue;
                }
            };

            let Some(items) = record_array(document) else {
                log::warn!("⚠️  [hsw] {} returned no transaction array, trying next...", url);
                report.failed_items += 1;
                last_error = format!("{} returned no transaction array", url);
                continue;
            };

            log::info!("✅ [hsw] Got {} records from {}", items.len(), url);
            emit(self.source_id(), items, &tx, &mut report).await;
            return Ok(report);
        }

        Err(SourceError::Unavailable {
            source_id: self.source_id(),
            reason: last_error,
        })
    }
}
