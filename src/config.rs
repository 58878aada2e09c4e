use secrecy::SecretString;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATABASE: &str = "trading_analytics.db";
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(String),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// How much history the provider returns per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputSize {
    /// The latest 100 trading days.
    #[default]
    Compact,
    /// The full available history.
    Full,
}

impl OutputSize {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputSize::Compact => "compact",
            OutputSize::Full => "full",
        }
    }
}

impl FromStr for OutputSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(OutputSize::Compact),
            "full" => Ok(OutputSize::Full),
            other => Err(format!("unknown output size {other:?}")),
        }
    }
}

/// Process-wide settings, loaded once at startup and shared read-only.
#[derive(Debug)]
pub struct AppConfig {
    pub database_path: String,
    pub api_key: SecretString,
    pub api_base_url: String,
    pub http_timeout: Duration,
    pub output_size: OutputSize,
    pub server_port: u16,
    pub default_symbol: String,
    pub short_window: usize,
    pub long_window: usize,
    /// Calendar days covered by one backfill batch.
    pub backfill_batch_days: u32,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = first_set(&lookup, &["ALPHA_VANTAGE_API_KEY", "API_KEY"])
            .ok_or_else(|| ConfigError::Missing("ALPHA_VANTAGE_API_KEY".into()))?;

        let short_window = parse_or(&lookup, "SHORT_WINDOW", 20usize)?;
        let long_window = parse_or(&lookup, "LONG_WINDOW", 50usize)?;
        if short_window == 0 || short_window >= long_window {
            return Err(ConfigError::Invalid {
                key: "SHORT_WINDOW".into(),
                value: format!("{short_window} (long window {long_window})"),
            });
        }

        let timeout_secs = parse_or(&lookup, "HTTP_TIMEOUT_SECS", 20u64)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "HTTP_TIMEOUT_SECS".into(),
                value: "0".into(),
            });
        }

        let backfill_batch_days = parse_or(&lookup, "BACKFILL_BATCH_DAYS", 90u32)?;
        if backfill_batch_days == 0 {
            return Err(ConfigError::Invalid {
                key: "BACKFILL_BATCH_DAYS".into(),
                value: "0".into(),
            });
        }

        Ok(Self {
            database_path: first_set(&lookup, &["DATABASE_PATH", "DATABASE_NAME"])
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            api_key: SecretString::from(api_key),
            api_base_url: first_set(&lookup, &["API_BASE_URL"])
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            http_timeout: Duration::from_secs(timeout_secs),
            output_size: parse_or(&lookup, "OUTPUT_SIZE", OutputSize::default())?,
            server_port: parse_or(&lookup, "SERVER_PORT", 5000u16)?,
            default_symbol: first_set(&lookup, &["DEFAULT_SYMBOL"])
                .unwrap_or_else(|| "AAPL".to_string()),
            short_window,
            long_window,
            backfill_batch_days,
        })
    }
}

fn first_set<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .find_map(|k| lookup(*k).filter(|v| !v.trim().is_empty()))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
    }
}
