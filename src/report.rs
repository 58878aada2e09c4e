// Plain-text summary of the latest analyzed bar
use crate::model::{AnalyzedSeries, RenderError};

/// Renders the report for the last bar of `series`.
///
/// Missing moving averages print as `NaN`; they compare as "not greater",
/// so such a report recommends selling, the same as a tie.
pub fn render(series: &AnalyzedSeries, symbol: &str) -> Result<String, RenderError> {
    let latest = series.last().ok_or(RenderError::EmptySeries)?;

    let bullish = matches!(
        (latest.short_ma, latest.long_ma),
        (Some(short), Some(long)) if short > long
    );

    let (recommendation, trend) = if bullish {
        ("Buy", "upward")
    } else {
        ("Sell", "downward")
    };

    let report = format!(
        "Stock Analysis Report for {symbol}\n\
         ---------------------------------\n\
         Latest Close Price: {close:.2}\n\
         Latest SMA {short_window}: {short_ma}\n\
         Latest SMA {long_window}: {long_ma}\n\
         Recommendation: Potential {recommendation} Signal Detected\n\
         Overall Trending: {trend}\n",
        close = latest.bar.close,
        short_window = series.short_window,
        short_ma = fmt_ma(latest.short_ma),
        long_window = series.long_window,
        long_ma = fmt_ma(latest.long_ma),
    );

    Ok(report)
}

fn fmt_ma(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "NaN".to_string(),
    }
}
