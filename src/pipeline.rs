use crate::analyzer::{Analyzer, TrendAnalyzer};
use crate::fetcher::MarketDataSource;
use crate::model::{
    AnalysisError, AnalyzedSeries, DailyBar, FetchError, NormalizationError, RenderError,
    StoreError,
};
use crate::normalizer::normalize;
use crate::report::render;
use crate::storage::SqliteStore;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_BATCH_DAYS: u32 = 90;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Normalize(#[from] NormalizationError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("backfill needs a database")]
    NoStore,
    #[error("range start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub symbol: String,
    pub series: AnalyzedSeries,
    pub report: String,
    /// Id of the stored report, if a store is attached and the write succeeded.
    pub analysis_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub inserted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub symbol: String,
    pub batches: Vec<BatchReport>,
}

impl BackfillReport {
    pub fn inserted(&self) -> usize {
        self.batches.iter().map(|b| b.inserted).sum()
    }

    pub fn failed(&self) -> usize {
        self.batches.iter().map(|b| b.failed).sum()
    }
}

/// Fetch → normalize → persist → analyze → render, for one symbol at a time.
pub struct Pipeline {
    source: Arc<dyn MarketDataSource>,
    analyzer: TrendAnalyzer,
    store: Option<SqliteStore>,
    batch_days: u32,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        analyzer: TrendAnalyzer,
        store: Option<SqliteStore>,
    ) -> Self {
        Self {
            source,
            analyzer,
            store,
            batch_days: DEFAULT_BATCH_DAYS,
        }
    }

    /// Calendar days per backfill batch; zero is treated as one.
    pub fn with_batch_days(mut self, batch_days: u32) -> Self {
        self.batch_days = batch_days.max(1);
        self
    }

    pub fn source(&self) -> &Arc<dyn MarketDataSource> {
        &self.source
    }

    pub async fn run(&self, symbol: &str) -> Result<PipelineOutcome, PipelineError> {
        info!(symbol, "running trend analysis");

        let raw = self.source.fetch(symbol).await?;
        let bars = normalize(&raw)
            .inspect_err(|e| warn!(symbol, error = %e, "normalization failed"))?;
        info!(symbol, bars = bars.len(), "series normalized");

        let series = self.analyzer.analyze(Some(&bars))?;
        let report = render(&series, &raw.symbol)?;

        // store failures are logged by the store and never abort the run
        let analysis_id = match &self.store {
            Some(store) => {
                let store = store.clone();
                let symbol = raw.symbol.clone();
                let text = report.clone();
                tokio::task::spawn_blocking(move || {
                    if let Ok(r) = store.bulk_insert(&bars) {
                        info!(symbol = %symbol, inserted = r.inserted, skipped = r.failed, "bars persisted");
                    }
                    store.save_analysis(&symbol, &text).ok()
                })
                .await
                .map_err(|e| PipelineError::Task(e.to_string()))?
            }
            None => None,
        };

        Ok(PipelineOutcome {
            symbol: raw.symbol,
            series,
            report,
            analysis_id,
        })
    }

    /// Stores the bars of `symbol` dated within `start..=end`, one batch of
    /// `batch_days` calendar days at a time. Rows already stored count as
    /// failed in their batch.
    pub async fn backfill(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BackfillReport, PipelineError> {
        let store = self.store.clone().ok_or(PipelineError::NoStore)?;
        if start > end {
            return Err(PipelineError::InvalidRange { start, end });
        }
        info!(symbol, %start, %end, "backfilling daily bars");

        let raw = self.source.fetch(symbol).await?;
        let bars = normalize(&raw)
            .inspect_err(|e| warn!(symbol, error = %e, "normalization failed"))?;
        let batches = date_batches(start, end, self.batch_days);
        let symbol = raw.symbol;

        tokio::task::spawn_blocking(move || -> Result<BackfillReport, PipelineError> {
            let mut reports = Vec::with_capacity(batches.len());
            for (from, to) in batches {
                let chunk: Vec<DailyBar> = bars
                    .iter()
                    .filter(|b| (from..=to).contains(&b.date))
                    .cloned()
                    .collect();
                let stored = store.bulk_insert(&chunk)?;
                info!(
                    symbol = %symbol,
                    %from,
                    %to,
                    inserted = stored.inserted,
                    skipped = stored.failed,
                    "batch stored"
                );
                reports.push(BatchReport {
                    start: from,
                    end: to,
                    inserted: stored.inserted,
                    failed: stored.failed,
                });
            }
            Ok(BackfillReport {
                symbol,
                batches: reports,
            })
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?
    }
}

/// Splits `start..=end` into consecutive inclusive ranges of at most
/// `days` calendar days.
pub fn date_batches(start: NaiveDate, end: NaiveDate, days: u32) -> Vec<(NaiveDate, NaiveDate)> {
    let span = Days::new(u64::from(days.max(1)) - 1);
    let mut batches = Vec::new();
    let mut from = start;

    while from <= end {
        let to = from.checked_add_days(span).map_or(end, |d| d.min(end));
        batches.push((from, to));
        match to.succ_opt() {
            Some(next) => from = next,
            None => break,
        }
    }
    batches
}
