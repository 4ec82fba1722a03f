//! In-memory set of already-ingested dedup keys
//!
//! Seeded from the store at the start of a run, then grown as trades are
//! admitted. The first trade seen for a key wins; later versions are
//! dropped even if their amounts or dates differ.

use super::db::TradeStore;
use super::types::{CanonicalTrade, DedupKey};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct DedupIndex {
    keys: HashSet<DedupKey>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every existing key, `page_size` at a time, until a short page
    ///
    /// A failed page is logged and seeding stops with what was gathered;
    /// the store's uniqueness constraint still rejects anything missed.
    pub async fn seed(store: &dyn TradeStore, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let mut index = Self::new();
        let mut offset = 0;

        loop {
            match store.list_dedup_keys(offset, page_size).await {
                Ok(page) => {
                    let count = page.len();
                    index.keys.extend(page);
                    offset += count;
                    if count < page_size {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!(
                        "⚠️  Dedup seeding failed at offset {}: {} (continuing with {} keys)",
                        offset,
                        e,
                        index.len()
                    );
                    break;
                }
            }
        }

        log::info!("🔑 Loaded {} existing trade keys", index.len());
        index
    }

    /// `true` if the trade's key is new; the key is recorded immediately
    pub fn admit(&mut self, trade: &CanonicalTrade) -> bool {
        self.keys.insert(trade.dedup_key())
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
