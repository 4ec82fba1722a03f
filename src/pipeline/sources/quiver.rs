//! Quiver Quantitative congressional trading
//!
//! Bulk endpoint authenticated with `Authorization: Token <key>` (not
//! `Bearer`). Endpoint variants are tried in order; the first one returning
//! a non-empty array wins.

use super::{emit, record_array, FetchReport, FetchSession, HttpRequest, SourceAdapter};
use crate::pipeline::error::SourceError;
use crate::pipeline::types::{RawRecord, SourceId};
use async_trait::async_trait;
use tokio::sync::mpsc;

pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://api.quiverquant.com/beta/bulk/congresstrading",
    "https://api.quiverquant.com/beta/historical/congresstrading",
    "https://api.quiverquant.com/beta/live/congresstrading",
];

pub const API_KEY_VAR: &str = "QUIVER_API_KEY";

pub struct QuiverSource {
    endpoints: Vec<String>,
    api_key: Option<String>,
}

impl QuiverSource {
    pub fn new(endpoints: Vec<String>, api_key: Option<String>) -> Self {
        Self { endpoints, api_key }
    }
}

#[async_trait]
impl SourceAdapter for QuiverSource {
    fn source_id(&self) -> SourceId {
        SourceId::Quiver
    }

    async fn fetch(&self, session: &FetchSession, tx: mpsc::Sender<RawRecord>) -> Result<FetchReport, SourceError> {
        let api_key = self.api_key.as_deref().ok_or(SourceError::MissingCredential {
            source_id: self.source_id(),
            variable: API_KEY_VAR,
        })?;

        let mut report = FetchReport::default();
        let mut last_error = String::from("no endpoints configured");

        for endpoint in &self.endpoints {
            log::info!("📥 [quiver] Trying: {}", endpoint);
            report.requests += 1;

            let request = HttpRequest::get(endpoint).header("Authorization", format!("Token {}", api_key));
            let items = match session.get_json(self.source_id(), endpoint, &request).await {
                Ok(document) => record_array(document).unwrap_or_default(),
                Err(SourceError::Http { status: 401, .. }) => {
                    // Same key for every endpoint, no point continuing
                    return Err(SourceError::Unavailable {
                        source_id: self.source_id(),
                        reason: format!("invalid {}", API_KEY_VAR),
                    });
                }
                Err(e) => {
                    log::warn!("⚠️  [quiver] {} failed: {}", endpoint, e);
                    report.failed_items += 1;
                    last_error = e.to_string();
                    continue;
                }
            };

            if items.is_empty() {
                log::warn!("⚠️  [quiver] {} returned no data, trying next...", endpoint);
                last_error = format!("{} returned no data", endpoint);
                continue;
            }

            log::info!("✅ [quiver] Got {} records from {}", items.len(), endpoint);
            emit(self.source_id(), items, &tx, &mut report).await;
            return Ok(report);
        }

        Err(SourceError::Unavailable {
            source_id: self.source_id(),
            reason: last_error,
        })
    }
}
