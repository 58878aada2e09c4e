use crate::config::{AppConfig, OutputSize};
use crate::fetcher::traits::MarketDataSource;
use crate::model::FetchError;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    output_size: OutputSize,
}

impl AlphaVantageClient {
    pub fn new(config: &AppConfig) -> Result<Self, FetchError> {
        Self::with_endpoint(
            config.api_base_url.clone(),
            SecretString::from(config.api_key.expose_secret().to_string()),
            config.http_timeout,
        )
        .map(|client| client.with_output_size(config.output_size))
    }

    pub fn with_endpoint(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("stock-trend/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
            output_size: OutputSize::default(),
        })
    }

    pub fn with_output_size(mut self, output_size: OutputSize) -> Self {
        self.output_size = output_size;
        self
    }

    async fn request(&self, symbol: &str) -> Result<serde_json::Value, FetchError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", self.output_size.as_str()),
                ("apikey", self.api_key.expose_secret()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let payload = response.json::<serde_json::Value>().await?;
        debug!(symbol, "provider payload received");
        Ok(payload)
    }
}

#[async_trait::async_trait]
impl MarketDataSource for AlphaVantageClient {
    async fn fetch_raw(&self, symbol: &str) -> Result<serde_json::Value, FetchError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(FetchError::InvalidSymbol);
        }

        info!(symbol, "fetching daily series");
        self.request(symbol)
            .await
            .inspect_err(|e| warn!(symbol, error = %e, "market data fetch failed"))
    }
}
