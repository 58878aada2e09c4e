// Decoding of the provider's TIME_SERIES_DAILY payload
use crate::model::{FetchError, RawDay, RawSeries};
use serde_json::Value;
use std::collections::HashMap;

const SERIES_KEY: &str = "Time Series (Daily)";
const META_KEY: &str = "Meta Data";
const META_SYMBOL_KEY: &str = "2. Symbol";
const ERROR_KEYS: [&str; 3] = ["Error Message", "Note", "Information"];

pub fn decode_daily_series(symbol: &str, payload: Value) -> Result<RawSeries, FetchError> {
    let Value::Object(mut root) = payload else {
        return Err(FetchError::Decode("expected a JSON object".into()));
    };

    let symbol = root
        .get(META_KEY)
        .and_then(|meta| meta.get(META_SYMBOL_KEY))
        .and_then(Value::as_str)
        .unwrap_or(symbol)
        .to_string();

    let Some(series) = root.remove(SERIES_KEY) else {
        if let Some(message) = ERROR_KEYS.iter().find_map(|k| root.get(*k)) {
            let message = match message {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(FetchError::Api(message));
        }
        return Ok(RawSeries {
            symbol,
            days: HashMap::new(),
        });
    };

    let days: HashMap<String, RawDay> =
        serde_json::from_value(series).map_err(|e| FetchError::Decode(e.to_string()))?;

    Ok(RawSeries { symbol, days })
}
