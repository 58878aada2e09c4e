// Core structs: DailyBar, RawSeries, AnalyzedSeries and the error taxonomy
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// One trading day for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Fields of one provider day, keyed by the provider's own names ("1. open", ...).
pub type RawDay = HashMap<String, serde_json::Value>;

/// Daily time series exactly as the provider returned it, before any parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSeries {
    pub symbol: String,
    pub days: HashMap<String, RawDay>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    Buy(f64),
    Sell(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Buy,
    Sell,
}

impl Signal {
    pub fn price(&self) -> f64 {
        match self {
            Signal::Buy(p) | Signal::Sell(p) => *p,
        }
    }

    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Buy(_) => SignalKind::Buy,
            Signal::Sell(_) => SignalKind::Sell,
        }
    }
}

/// Analyzer memory of the last fired signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendState {
    #[default]
    NoTrend,
    Uptrend,
    Downtrend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedBar {
    pub bar: DailyBar,
    pub short_ma: Option<f64>,
    pub long_ma: Option<f64>,
    pub signal: Option<Signal>,
}

impl AnalyzedBar {
    pub fn buy_signal_price(&self) -> Option<f64> {
        match self.signal {
            Some(Signal::Buy(p)) => Some(p),
            _ => None,
        }
    }

    pub fn sell_signal_price(&self) -> Option<f64> {
        match self.signal {
            Some(Signal::Sell(p)) => Some(p),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedSeries {
    pub short_window: usize,
    pub long_window: usize,
    pub bars: Vec<AnalyzedBar>,
    pub final_state: TrendState,
}

/// A fired crossover, flattened for reporting and JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalEvent {
    pub date: NaiveDate,
    pub kind: SignalKind,
    pub price: f64,
}

impl AnalyzedSeries {
    pub fn last(&self) -> Option<&AnalyzedBar> {
        self.bars.last()
    }

    pub fn signals(&self) -> impl Iterator<Item = SignalEvent> + '_ {
        self.bars.iter().filter_map(|b| {
            b.signal.map(|signal| SignalEvent {
                date: b.bar.date,
                kind: signal.kind(),
                price: signal.price(),
            })
        })
    }

    pub fn trend_state(&self) -> TrendState {
        self.final_state
    }
}

/// Aggregate of close prices for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceSummary {
    pub max_close: f64,
    pub min_close: f64,
    pub avg_close: f64,
}

/// Partial update of a stored bar; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarUpdate {
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

impl BarUpdate {
    pub fn is_empty(&self) -> bool {
        self.open.is_none()
            && self.high.is_none()
            && self.low.is_none()
            && self.close.is_none()
            && self.volume.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BulkInsertReport {
    pub inserted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("symbol must not be empty")]
    InvalidSymbol,
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
    #[error("provider error: {0}")]
    Api(String),
    #[error("failed to decode provider response: {0}")]
    Decode(String),
    #[error("transport error: {0}")]
    Unknown(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Connection(e.to_string())
        } else if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            FetchError::Unknown(e.to_string())
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum NormalizationError {
    #[error("malformed record for {date}: {reason}")]
    MalformedRecord { date: String, reason: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("no series supplied")]
    MissingData,
    #[error("invalid moving-average windows: short={short}, long={long}")]
    InvalidWindows { short: usize, long: usize },
    #[error("bars are not in ascending date order at index {index}")]
    Unordered { index: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("cannot render a report for an empty series")]
    EmptySeries,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("bar for {symbol} on {date} already exists")]
    DuplicateKey { symbol: String, date: NaiveDate },
    #[error("value conversion failed: {0}")]
    Conversion(String),
    #[error("{field} must be a finite, non-negative price, got {value}")]
    InvalidValue { field: &'static str, value: f64 },
}
