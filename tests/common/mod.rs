#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use serde_json::{Value, json};
use stock_trend::model::DailyBar;
use stock_trend::storage::SqliteStore;
use tempfile::TempDir;

pub struct TestDb {
    _dir: TempDir, // keep alive for the life of the test
    pub store: SqliteStore,
}

pub fn setup_store() -> TestDb {
    let dir = TempDir::new().expect("tempdir");
    let store = SqliteStore::new(dir.path().join("test.db"));
    store.create_schema_if_absent().expect("schema");
    TestDb { _dir: dir, store }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn bar(symbol: &str, date: NaiveDate, close: f64) -> DailyBar {
    DailyBar {
        symbol: symbol.to_string(),
        date,
        open: (close - 1.0).max(0.0),
        high: close + 2.0,
        low: (close - 2.0).max(0.0),
        close,
        volume: 1_000,
    }
}

/// Provider-shaped payload with one day per close, starting 2024-01-01.
pub fn provider_payload(symbol: &str, closes: &[f64]) -> Value {
    let start = date(2024, 1, 1);
    let mut days = serde_json::Map::new();
    for (i, close) in closes.iter().enumerate() {
        let day = start + Days::new(i as u64);
        days.insert(
            day.format("%Y-%m-%d").to_string(),
            json!({
                "1. open": format!("{close:.4}"),
                "2. high": format!("{:.4}", close + 1.0),
                "3. low": format!("{:.4}", (close - 1.0).max(0.0)),
                "4. close": format!("{close:.4}"),
                "5. volume": "1500",
            }),
        );
    }
    json!({
        "Meta Data": { "2. Symbol": symbol },
        "Time Series (Daily)": days,
    })
}

/// 19 rising closes followed by a flat plateau of 100s, 70 bars in all.
pub fn ramp_then_plateau() -> Vec<f64> {
    let mut closes: Vec<f64> = (1..=19).map(f64::from).collect();
    closes.extend(std::iter::repeat(100.0).take(51));
    closes
}
