//! Trade normalization from source-specific raw records to `CanonicalTrade`
//!
//! Each source names equivalent fields differently (the transaction date is
//! `transaction_date`, `Traded`, `transactionDate` or `txDate` depending on
//! the provider). `FIELD_MAPPINGS` holds one extractor per `SourceId`; the
//! extractor only pulls values out, and the shared validation below turns
//! them into a canonical trade or a `RejectReason`.

use super::amount::parse_amount;
use super::error::RejectReason;
use super::types::{CanonicalTrade, Chamber, RawRecord, SourceId, TradeType};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

pub const MAX_TICKER_LEN: usize = 10;
pub const MAX_COMPANY_NAME_LEN: usize = 200;
pub const DEFAULT_ASSET_TYPE: &str = "Stock";

/// Ticker placeholders used by disclosure feeds for non-listed assets
const TICKER_PLACEHOLDERS: &[&str] = &["--", "N/A"];

/// Source-agnostic view of a raw record, before validation
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtractedFields {
    pub member_name: Option<String>,
    /// Explicit chamber text supplied by the source
    pub chamber: Option<String>,
    /// Position or title used when no chamber is supplied
    pub position: Option<String>,
    pub party: Option<String>,
    pub state: Option<String>,
    /// District code such as `"CA12"`
    pub district: Option<String>,
    pub ticker: Option<String>,
    pub company_name: Option<String>,
    pub asset_type: Option<String>,
    pub trade_type: Option<String>,
    pub amount_text: Option<String>,
    pub amount_low: Option<i64>,
    pub amount_high: Option<i64>,
    pub trade_date: Option<String>,
    pub disclosure_date: Option<String>,
    pub source_url: Option<String>,
}

type Extractor = fn(&RawRecord) -> ExtractedFields;

/// Per-source mapping table
const FIELD_MAPPINGS: &[(SourceId, Extractor)] = &[
    (SourceId::HouseStockWatcher, extract_house_stock_watcher),
    (SourceId::Quiver, extract_quiver),
    (SourceId::Finnhub, extract_finnhub),
    (SourceId::CapitolTrades, extract_capitol_trades),
];

fn extract_house_stock_watcher(raw: &RawRecord) -> ExtractedFields {
    ExtractedFields {
        member_name: raw.text(&["representative", "politician"]),
        // Dataset covers the House only
        chamber: Some("House".to_string()),
        party: raw.text(&["party"]),
        district: raw.text(&["district"]),
        ticker: raw.text(&["ticker"]),
        company_name: raw.text(&["asset_description", "asset"]),
        trade_type: raw.text(&["type", "transaction_type"]),
        amount_text: raw.text(&["amount"]),
        trade_date: raw.text(&["transaction_date", "trade_date"]),
        disclosure_date: raw.text(&["disclosure_date"]),
        source_url: raw.text(&["ptr_link", "source_url"]),
        ..Default::default()
    }
}

fn extract_quiver(raw: &RawRecord) -> ExtractedFields {
    ExtractedFields {
        member_name: raw.text(&["Name", "Representative"]),
        chamber: raw.text(&["Chamber", "House"]),
        party: raw.text(&["Party"]),
        state: raw.text(&["State"]),
        district: raw.text(&["District"]),
        ticker: raw.text(&["Ticker"]),
        company_name: raw.text(&["Company", "Description"]),
        asset_type: raw.text(&["TickerType", "AssetType"]),
        trade_type: raw.text(&["Transaction"]),
        amount_text: raw.text(&["Range", "Trade_Size_USD", "Amount"]),
        trade_date: raw.text(&["Traded", "TransactionDate"]),
        disclosure_date: raw.text(&["Filed", "ReportDate"]),
        ..Default::default()
    }
}

fn extract_finnhub(raw: &RawRecord) -> ExtractedFields {
    ExtractedFields {
        member_name: raw.text(&["name"]),
        position: raw.text(&["position"]),
        ticker: raw.text(&["symbol"]),
        company_name: raw.text(&["assetName"]),
        trade_type: raw.text(&["transactionType"]),
        amount_text: raw.text(&["transactionAmount", "amount"]),
        amount_low: raw.integer(&["amountFrom"]),
        amount_high: raw.integer(&["amountTo"]),
        trade_date: raw.text(&["transactionDate"]),
        disclosure_date: raw.text(&["filingDate"]),
        source_url: raw.text(&["sourceUrl"]),
        ..Default::default()
    }
}

fn extract_capitol_trades(raw: &RawRecord) -> ExtractedFields {
    let first = raw.text(&["politician/firstName"]).unwrap_or_default();
    let last = raw.text(&["politician/lastName"]).unwrap_or_default();
    let full_name = format!("{} {}", first, last).trim().to_string();

    ExtractedFields {
        member_name: Some(full_name).filter(|n| !n.is_empty()),
        chamber: raw.text(&["politician/chamber", "chamber"]),
        party: raw.text(&["politician/party"]),
        state: raw.text(&["politician/state", "politician/_stateId"]),
        ticker: raw.text(&["ticker", "asset/assetTicker"]),
        company_name: raw.text(&["assetDescription", "issuer/issuerName"]),
        asset_type: raw.text(&["assetType", "asset/assetType"]),
        trade_type: raw.text(&["txType"]),
        amount_text: raw.text(&["value"]),
        amount_low: raw.integer(&["size/low"]),
        amount_high: raw.integer(&["size/high"]),
        trade_date: raw.text(&["txDate"]),
        disclosure_date: raw.text(&["pubDate"]),
        source_url: raw
            .text(&["id", "_txId"])
            .map(|id| format!("https://capitoltrades.com/trades/{}", id)),
        ..Default::default()
    }
}

/// Maps raw records into canonical trades
#[derive(Debug, Default, Clone, Copy)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Extract source-specific fields via the mapping table
    pub fn extract(&self, raw: &RawRecord) -> ExtractedFields {
        FIELD_MAPPINGS
            .iter()
            .find(|(source, _)| *source == raw.source)
            .map(|(_, extractor)| extractor(raw))
            .unwrap_or_default()
    }

    /// Normalize one raw record or explain why it was rejected
    pub fn normalize(&self, raw: &RawRecord) -> Result<CanonicalTrade, RejectReason> {
        let fields = self.extract(raw);

        let member_name = fields
            .member_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(RejectReason::MissingMemberName)?
            .to_string();

        let ticker = normalize_ticker(fields.ticker.as_deref())?;

        let trade_date_text = fields.trade_date.as_deref().ok_or(RejectReason::MissingTradeDate)?;
        let trade_date = parse_date(trade_date_text)
            .ok_or_else(|| RejectReason::InvalidTradeDate(trade_date_text.to_string()))?;

        let raw_type = fields.trade_type.clone().unwrap_or_default();
        let trade_type = TradeType::from_keywords(&raw_type)
            .ok_or(RejectReason::UnrecognizedTradeType(raw_type))?;

        let (amount_low, amount_high) = resolve_amounts(&fields);

        let chamber = fields
            .chamber
            .as_deref()
            .and_then(Chamber::from_keywords)
            .or_else(|| fields.position.as_deref().and_then(Chamber::from_keywords))
            .unwrap_or(Chamber::Unknown);

        let state = non_empty(fields.state.clone())
            .map(|state| state.to_uppercase())
            .or_else(|| fields.district.as_deref().and_then(state_from_district));

        Ok(CanonicalTrade {
            member_name,
            chamber,
            party: non_empty(fields.party.clone()),
            state,
            ticker,
            company_name: non_empty(fields.company_name.clone())
                .map(|name| name.chars().take(MAX_COMPANY_NAME_LEN).collect()),
            asset_type: non_empty(fields.asset_type.clone())
                .unwrap_or_else(|| DEFAULT_ASSET_TYPE.to_string()),
            trade_type,
            amount_low,
            amount_high,
            trade_date,
            disclosure_date: fields.disclosure_date.as_deref().and_then(parse_date),
            source_url: non_empty(fields.source_url.clone()),
            raw_data: serde_json::Value::Object(raw.fields.clone()).to_string(),
            source: raw.source,
        })
    }
}

fn normalize_ticker(ticker: Option<&str>) -> Result<String, RejectReason> {
    let ticker = ticker.map(str::trim).unwrap_or_default();
    if ticker.is_empty() || TICKER_PLACEHOLDERS.contains(&ticker) {
        return Err(RejectReason::MissingTicker);
    }
    // Uppercasing can lengthen the string (ß -> SS), so measure afterwards
    let upper = ticker.to_uppercase();
    if upper.chars().count() > MAX_TICKER_LEN {
        return Err(RejectReason::TickerTooLong(ticker.to_string()));
    }
    Ok(upper)
}

/// Explicit numeric bounds win; otherwise parse the band text
fn resolve_amounts(fields: &ExtractedFields) -> (Option<i64>, Option<i64>) {
    let (low, high) = match (fields.amount_low, fields.amount_high) {
        (Some(low), Some(high)) if low > 0 && high > 0 => (Some(low), Some(high)),
        _ => fields
            .amount_text
            .as_deref()
            .map(parse_amount)
            .unwrap_or((None, None)),
    };

    match (low, high) {
        (Some(l), Some(h)) if l > h => (Some(h), Some(l)),
        other => other,
    }
}

/// Leading two characters of a district code, uppercased (`"ca12"` -> `"CA"`)
pub fn state_from_district(district: &str) -> Option<String> {
    let district = district.trim();
    if district.chars().count() < 2 {
        return None;
    }
    Some(district.chars().take(2).collect::<String>().to_uppercase())
}

/// Accepts `YYYY-MM-DD`, `MM/DD/YYYY` and ISO-8601 date-times
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%m/%d/%Y"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
