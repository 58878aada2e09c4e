use crate::model::{DailyBar, NormalizationError, RawDay, RawSeries};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashSet;

const OPEN: &str = "1. open";
const HIGH: &str = "2. high";
const LOW: &str = "3. low";
const CLOSE: &str = "4. close";
const VOLUME: &str = "5. volume";

/// Turns the provider payload into bars sorted ascending by date.
///
/// One bar per date key; any bad record fails the whole series.
pub fn normalize(raw: &RawSeries) -> Result<Vec<DailyBar>, NormalizationError> {
    let mut bars = Vec::with_capacity(raw.days.len());
    let mut seen = HashSet::with_capacity(raw.days.len());

    // key order makes the reported failure the earliest bad date
    let mut days: Vec<_> = raw.days.iter().collect();
    days.sort_unstable_by(|a, b| a.0.cmp(b.0));

    for (key, day) in days {
        let bar = normalize_day(&raw.symbol, key, day)?;
        if !seen.insert(bar.date) {
            return Err(malformed(key, "duplicate calendar date"));
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

fn normalize_day(symbol: &str, key: &str, day: &RawDay) -> Result<DailyBar, NormalizationError> {
    let date = NaiveDate::parse_from_str(key.trim(), "%Y-%m-%d")
        .map_err(|e| malformed(key, &format!("invalid date: {e}")))?;

    Ok(DailyBar {
        symbol: symbol.to_string(),
        date,
        open: price(key, day, OPEN)?,
        high: price(key, day, HIGH)?,
        low: price(key, day, LOW)?,
        close: price(key, day, CLOSE)?,
        volume: volume(key, day)?,
    })
}

fn field<'a>(key: &str, day: &'a RawDay, name: &str) -> Result<&'a Value, NormalizationError> {
    day.get(name)
        .ok_or_else(|| malformed(key, &format!("missing field {name:?}")))
}

fn price(key: &str, day: &RawDay, name: &str) -> Result<f64, NormalizationError> {
    let parsed = match field(key, day, name)? {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };

    match parsed {
        Some(p) if p.is_finite() && p >= 0.0 => Ok(p),
        Some(p) => Err(malformed(key, &format!("{name:?} out of range: {p}"))),
        None => Err(malformed(key, &format!("{name:?} is not a number"))),
    }
}

fn volume(key: &str, day: &RawDay) -> Result<u64, NormalizationError> {
    let parsed = match field(key, day, VOLUME)? {
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    };
    parsed.ok_or_else(|| malformed(key, &format!("{VOLUME:?} is not a non-negative integer")))
}

fn malformed(date: &str, reason: &str) -> NormalizationError {
    NormalizationError::MalformedRecord {
        date: date.to_string(),
        reason: reason.to_string(),
    }
}
