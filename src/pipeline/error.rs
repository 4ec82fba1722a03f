//! Error taxonomy for the ingestion pipeline
//!
//! Only `ConfigError::MissingVariable` for the store aborts a run. Everything
//! else is recovered where it happens and surfaces as a summary count.

use super::types::SourceId;
use thiserror::Error;

/// Adapter and request level failures
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{source_id} unavailable: {reason}")]
    Unavailable { source_id: SourceId, reason: String },

    #[error("{source_id} requires {variable} to be set")]
    MissingCredential {
        source_id: SourceId,
        variable: &'static str,
    },

    #[error("rate limited by {0}")]
    RateLimited(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl SourceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited(_))
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Transport(err.to_string())
    }
}

/// Why a raw record did not become a `CanonicalTrade`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("missing member name")]
    MissingMemberName,

    #[error("missing ticker")]
    MissingTicker,

    #[error("ticker '{0}' longer than 10 characters")]
    TickerTooLong(String),

    #[error("missing trade date")]
    MissingTradeDate,

    #[error("unparsable trade date '{0}'")]
    InvalidTradeDate(String),

    #[error("unrecognized trade type '{0}'")]
    UnrecognizedTradeType(String),
}

/// Persisted store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error("connection lock poisoned")]
    LockPoisoned,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
