//! Core data structures for the ingestion pipeline
//!
//! - `RawRecord` - one upstream record, shaped however the provider emits it
//! - `CanonicalTrade` - the persisted unit, produced only by the normalizer
//! - `DedupKey` - composite natural key used to detect already-ingested trades

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Upstream provider identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceId {
    /// House Stock Watcher bulk dataset (House only, no auth)
    #[serde(rename = "hsw")]
    HouseStockWatcher,
    /// Quiver Quantitative bulk endpoint (token auth)
    #[serde(rename = "quiver")]
    Quiver,
    /// Finnhub per-symbol congressional trading query
    #[serde(rename = "finnhub")]
    Finnhub,
    /// Capitol Trades paginated aggregator
    #[serde(rename = "capitol_trades")]
    CapitolTrades,
}

impl SourceId {
    pub const ALL: [SourceId; 4] = [
        SourceId::HouseStockWatcher,
        SourceId::Quiver,
        SourceId::Finnhub,
        SourceId::CapitolTrades,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::HouseStockWatcher => "hsw",
            SourceId::Quiver => "quiver",
            SourceId::Finnhub => "finnhub",
            SourceId::CapitolTrades => "capitol_trades",
        }
    }

    /// Resolve a source selection; empty or `all` means every source
    ///
    /// Order is preserved and repeats are dropped, since run order decides
    /// which source's version of a shared trade is kept.
    pub fn parse_selection<S: AsRef<str>>(items: &[S]) -> Result<Vec<SourceId>, String> {
        let mut selected = Vec::new();
        for item in items {
            let item = item.as_ref().trim();
            if item.is_empty() {
                continue;
            }
            if item.eq_ignore_ascii_case("all") {
                return Ok(Self::ALL.to_vec());
            }
            let source: SourceId = item.parse()?;
            if !selected.contains(&source) {
                selected.push(source);
            }
        }
        if selected.is_empty() {
            return Ok(Self::ALL.to_vec());
        }
        Ok(selected)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hsw" | "house_stock_watcher" => Ok(SourceId::HouseStockWatcher),
            "quiver" => Ok(SourceId::Quiver),
            "fin" | "finnhub" => Ok(SourceId::Finnhub),
            "capitol" | "capitol_trades" => Ok(SourceId::CapitolTrades),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

/// A single upstream record tagged with its source
///
/// Fields are kept as an untyped JSON object; the normalizer owns all
/// knowledge of per-source field names.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub source: SourceId,
    pub fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(source: SourceId, fields: Map<String, Value>) -> Self {
        Self { source, fields }
    }

    /// Build from any JSON value; non-objects yield `None`
    pub fn from_value(source: SourceId, value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { source, fields }),
            _ => None,
        }
    }

    /// Look up a value by `/`-separated path (`"politician/firstName"`)
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('/');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// First non-empty string among `paths`; numbers are rendered as text
    pub fn text(&self, paths: &[&str]) -> Option<String> {
        paths.iter().find_map(|path| match self.get(path)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// First integer among `paths`; numeric strings are accepted
    pub fn integer(&self, paths: &[&str]) -> Option<i64> {
        paths.iter().find_map(|path| match self.get(path)? {
            Value::Number(n) => n.as_i64().or_else(|| {
                // `as` saturates, so anything outside the i64 range is dropped here
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                    .map(|f| f.round() as i64)
            }),
            Value::String(s) => s.trim().replace(',', "").parse::<i64>().ok(),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Chamber {
    House,
    Senate,
    Unknown,
}

impl Chamber {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chamber::House => "House",
            Chamber::Senate => "Senate",
            Chamber::Unknown => "Unknown",
        }
    }

    /// Keyword match on a chamber or position/title string
    ///
    /// Returns `None` when nothing matches so callers can fall through to
    /// the next hint.
    pub fn from_keywords(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        if lower.contains("senator") || lower.contains("senate") {
            Some(Chamber::Senate)
        } else if lower.contains("representative") || lower.contains("house") || lower.contains("rep") {
            Some(Chamber::House)
        } else {
            None
        }
    }
}

impl fmt::Display for Chamber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chamber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "House" => Ok(Chamber::House),
            "Senate" => Ok(Chamber::Senate),
            "Unknown" => Ok(Chamber::Unknown),
            other => Err(format!("invalid chamber '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TradeType {
    Purchase,
    Sale,
    Exchange,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Purchase => "Purchase",
            TradeType::Sale => "Sale",
            TradeType::Exchange => "Exchange",
        }
    }

    /// Case-insensitive keyword match (`"Sale (Partial)"` -> Sale)
    pub fn from_keywords(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        if lower.contains("purchase") || lower.contains("buy") {
            Some(TradeType::Purchase)
        } else if lower.contains("sale") || lower.contains("sell") {
            Some(TradeType::Sale)
        } else if lower.contains("exchange") || lower.contains("swap") {
            Some(TradeType::Exchange)
        } else {
            None
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Purchase" => Ok(TradeType::Purchase),
            "Sale" => Ok(TradeType::Sale),
            "Exchange" => Ok(TradeType::Exchange),
            other => Err(format!("invalid trade type '{}'", other)),
        }
    }
}

/// Composite natural key `(member_name, ticker, trade_date, trade_type)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub member_name: String,
    pub ticker: String,
    pub trade_date: NaiveDate,
    pub trade_type: TradeType,
}

/// Normalized trade in the unified schema
///
/// Column reference: `sql/01_congressional_trades.sql`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalTrade {
    pub member_name: String,
    pub chamber: Chamber,
    pub party: Option<String>,
    pub state: Option<String>,
    pub ticker: String,
    pub company_name: Option<String>,
    pub asset_type: String,
    pub trade_type: TradeType,
    pub amount_low: Option<i64>,
    pub amount_high: Option<i64>,
    pub trade_date: NaiveDate,
    pub disclosure_date: Option<NaiveDate>,
    pub source_url: Option<String>,
    pub raw_data: String,
    pub source: SourceId,
}

impl CanonicalTrade {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            member_name: self.member_name.clone(),
            ticker: self.ticker.clone(),
            trade_date: self.trade_date,
            trade_type: self.trade_type,
        }
    }
}

#[cfg(test)]
impl CanonicalTrade {
    /// Minimal valid trade for store and loader tests
    pub(crate) fn sample(member_name: &str, ticker: &str, trade_date: &str, trade_type: TradeType) -> Self {
        Self {
            member_name: member_name.to_string(),
            chamber: Chamber::House,
            party: None,
            state: None,
            ticker: ticker.to_string(),
            company_name: None,
            asset_type: "Stock".to_string(),
            trade_type,
            amount_low: Some(1_001),
            amount_high: Some(15_000),
            trade_date: NaiveDate::parse_from_str(trade_date, "%Y-%m-%d").unwrap(),
            disclosure_date: None,
            source_url: None,
            raw_data: "{}".to_string(),
            source: SourceId::HouseStockWatcher,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        RawRecord::from_value(SourceId::CapitolTrades, value).unwrap()
    }

    #[test]
    fn test_nested_path_lookup() {
        let raw = record(json!({
            "politician": {"firstName": "Nancy", "lastName": "Pelosi"},
            "size": {"low": 1001, "high": "15,000"}
        }));

        assert_eq!(raw.text(&["politician/firstName"]), Some("Nancy".to_string()));
        assert_eq!(raw.text(&["politician/middleName", "politician/lastName"]), Some("Pelosi".to_string()));
        assert_eq!(raw.integer(&["size/low"]), Some(1001));
        assert_eq!(raw.integer(&["size/high"]), Some(15000));
        assert!(raw.get("politician/firstName/extra").is_none());
    }

    #[test]
    fn test_out_of_range_number_is_not_an_integer() {
        let raw = record(json!({"huge": 1e300, "negative": -1e300, "unsigned": u64::MAX, "fraction": 15000.6}));
        assert_eq!(raw.integer(&["huge"]), None);
        assert_eq!(raw.integer(&["negative"]), None);
        assert_eq!(raw.integer(&["unsigned"]), None);
        assert_eq!(raw.integer(&["huge", "fraction"]), Some(15001));
    }

    #[test]
    fn test_blank_text_is_skipped() {
        let raw = record(json!({"a": "   ", "b": "value"}));
        assert_eq!(raw.text(&["a", "b"]), Some("value".to_string()));
    }

    #[test]
    fn test_non_object_is_not_a_record() {
        assert!(RawRecord::from_value(SourceId::Finnhub, json!([1, 2])).is_none());
    }

    #[test]
    fn test_trade_type_keywords() {
        assert_eq!(TradeType::from_keywords("BUY"), Some(TradeType::Purchase));
        assert_eq!(TradeType::from_keywords("purchase"), Some(TradeType::Purchase));
        assert_eq!(TradeType::from_keywords("Buy Stock"), Some(TradeType::Purchase));
        assert_eq!(TradeType::from_keywords("Sale (Partial)"), Some(TradeType::Sale));
        assert_eq!(TradeType::from_keywords("sell"), Some(TradeType::Sale));
        assert_eq!(TradeType::from_keywords("Exchange"), Some(TradeType::Exchange));
        assert_eq!(TradeType::from_keywords("foo"), None);
    }

    #[test]
    fn test_chamber_keywords() {
        assert_eq!(Chamber::from_keywords("Senator"), Some(Chamber::Senate));
        assert_eq!(Chamber::from_keywords("senate"), Some(Chamber::Senate));
        assert_eq!(Chamber::from_keywords("Representative"), Some(Chamber::House));
        assert_eq!(Chamber::from_keywords("Rep."), Some(Chamber::House));
        assert_eq!(Chamber::from_keywords("Governor"), None);
        assert_eq!(Chamber::from_keywords(""), None);
    }

    #[test]
    fn test_source_id_parsing() {
        assert_eq!("fin".parse::<SourceId>(), Ok(SourceId::Finnhub));
        assert_eq!("HSW".parse::<SourceId>(), Ok(SourceId::HouseStockWatcher));
        assert_eq!("capitol".parse::<SourceId>(), Ok(SourceId::CapitolTrades));
        assert!("nope".parse::<SourceId>().is_err());
    }

    #[test]
    fn test_source_selection() {
        let none: [&str; 0] = [];
        assert_eq!(SourceId::parse_selection(&none).unwrap(), SourceId::ALL.to_vec());
        assert_eq!(SourceId::parse_selection(&["all"]).unwrap(), SourceId::ALL.to_vec());
        assert_eq!(
            SourceId::parse_selection(&["finnhub", "hsw", "fin"]).unwrap(),
            vec![SourceId::Finnhub, SourceId::HouseStockWatcher]
        );
        assert!(SourceId::parse_selection(&["hsw", "bogus"]).is_err());
    }
}
