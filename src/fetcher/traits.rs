use crate::fetcher::response::decode_daily_series;
use crate::model::{FetchError, RawSeries};

#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Provider payload for one symbol, untouched.
    async fn fetch_raw(&self, symbol: &str) -> Result<serde_json::Value, FetchError>;

    /// Daily series for one symbol, still in provider-native string form.
    async fn fetch(&self, symbol: &str) -> Result<RawSeries, FetchError> {
        let payload = self.fetch_raw(symbol).await?;
        decode_daily_series(symbol, payload)
    }
}
