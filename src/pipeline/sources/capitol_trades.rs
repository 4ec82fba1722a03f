//! Capitol Trades paginated feed
//!
//! Pages are requested with `page`/`pageSize` until a short page comes back
//! or `max_pages` is reached. A failed page cannot be resumed by offset, so
//! it is counted and the next page is requested.

use super::{emit, record_array, FetchReport, FetchSession, HttpRequest, SourceAdapter};
use crate::pipeline::config::CapitolTradesConfig;
use crate::pipeline::error::SourceError;
use crate::pipeline::types::{RawRecord, SourceId};
use async_trait::async_trait;
use tokio::sync::mpsc;

pub const DEFAULT_ENDPOINT: &str = "https://bff.capitoltrades.com/trades";

pub struct CapitolTradesSource {
    config: CapitolTradesConfig,
}

impl CapitolTradesSource {
    pub fn new(config: CapitolTradesConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceAdapter for CapitolTradesSource {
    fn source_id(&self) -> SourceId {
        SourceId::CapitolTrades
    }

    async fn fetch(&self, session: &FetchSession, tx: mpsc::Sender<RawRecord>) -> Result<FetchReport, SourceError> {
        let page_size = self.config.page_size.max(1);
        let mut report = FetchReport::default();

        log::info!(
            "📥 [capitol] Fetching up to {} pages of {} from {}",
            self.config.max_pages,
            page_size,
            self.config.endpoint
        );

        for page in 1..=self.config.max_pages {
            report.requests += 1;
            let label = format!("page {}", page);
            let request = HttpRequest::get(&self.config.endpoint)
                .query("page", page)
                .query("pageSize", page_size);

            let items = match session.get_json(self.source_id(), &label, &request).await {
                Ok(document) => {
                    let items = record_array(document);
                    if items.is_none() {
                        log::warn!("⚠️  [capitol] {}: no data array in response", label);
                    }
                    items
                }
                Err(e) => {
                    log::warn!("⚠️  [capitol] {} failed: {}", label, e);
                    None
                }
            };

            let Some(items) = items else {
                report.failed_items += 1;
                if page == 1 && report.records == 0 {
                    return Err(SourceError::Unavailable {
                        source_id: self.source_id(),
                        reason: format!("{} failed", label),
                    });
                }
                continue;
            };

            let count = items.len();
            if !emit(self.source_id(), items, &tx, &mut report).await {
                log::info!("⏹️  [capitol] Record limit reached on {}", label);
                return Ok(report);
            }
            log::info!("   ├─ [capitol] {}: {} trades | Total: {}", label, count, report.records);

            if count < page_size {
                break;
            }
            if page == self.config.max_pages {
                log::warn!("⚠️  [capitol] Stopped at page cap ({}), feed may have more", page);
            }
        }

        log::info!("✅ [capitol] {} records, {} pages skipped", report.records, report.failed_items);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sources::testing::{collect, fast_session, ok_json, FakeTransport};
    use crate::pipeline::sources::HttpResponse;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    const ENDPOINT: &str = "https://capitol.example/trades";

    fn adapter(page_size: usize, max_pages: usize) -> CapitolTradesSource {
        CapitolTradesSource::new(CapitolTradesConfig {
            endpoint: ENDPOINT.to_string(),
            page_size,
            max_pages,
            min_interval: Duration::from_millis(1),
        })
    }

    fn page_of(page: usize, len: usize) -> Value {
        let data: Vec<Value> = (0..len)
            .map(|i| json!({"_txId": page * 100 + i, "ticker": "AAPL:US"}))
            .collect();
        json!({ "data": data })
    }

    /// Pages of `page_size` records until `last_page`, which is short
    fn paged_feed(page_size: usize, last_page: usize) -> FakeTransport {
        FakeTransport::new().route(move |request| {
            let page: usize = request.param("page")?.parse().ok()?;
            let len = if page < last_page { page_size } else { page_size / 2 };
            ok_json(page_of(page, len))
        })
    }

    #[tokio::test]
    async fn test_pages_until_short_page() {
        let transport = Arc::new(paged_feed(4, 3));
        let session = fast_session(transport.clone());

        let (report, records) = collect(&adapter(4, 50), &session).await;
        let report = report.unwrap();

        assert_eq!(report.requests, 3);
        assert_eq!(records.len(), 4 + 4 + 2);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[2].param("page"), Some("3"));
        assert_eq!(requests[2].param("pageSize"), Some("4"));
    }

    #[tokio::test]
    async fn test_page_cap_bounds_loop() {
        let transport = Arc::new(paged_feed(2, usize::MAX));
        let session = fast_session(transport);

        let (report, records) = collect(&adapter(2, 3), &session).await;

        assert_eq!(report.unwrap().requests, 3);
        assert_eq!(records.len(), 6);
    }

    #[tokio::test]
    async fn test_failed_middle_page_moves_on() {
        let transport = Arc::new(
            FakeTransport::new()
                .route(|request| match request.param("page") {
                    Some("2") => Some(Ok(HttpResponse { status: 500, body: String::new() })),
                    _ => None,
                })
                .route(|request| {
                    let page: usize = request.param("page")?.parse().ok()?;
                    ok_json(page_of(page, if page < 3 { 2 } else { 1 }))
                }),
        );
        let session = fast_session(transport);

        let (report, records) = collect(&adapter(2, 10), &session).await;
        let report = report.unwrap();

        assert_eq!(report.failed_items, 1);
        assert_eq!(report.requests, 3);
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_first_page_failure_is_unavailable() {
        let transport = Arc::new(FakeTransport::new().push_json(ENDPOINT, 503, json!({})));
        let session = fast_session(transport);

        let (report, records) = collect(&adapter(10, 10), &session).await;

        assert!(records.is_empty());
        assert!(matches!(
            report,
            Err(SourceError::Unavailable { source_id: SourceId::CapitolTrades, .. })
        ));
    }
}
