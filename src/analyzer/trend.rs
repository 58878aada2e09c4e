use crate::analyzer::indicators::rolling_mean;
use crate::model::{AnalysisError, AnalyzedBar, AnalyzedSeries, DailyBar, Signal, TrendState};

pub const DEFAULT_SHORT_WINDOW: usize = 20;
pub const DEFAULT_LONG_WINDOW: usize = 50;

/// Trait defining the interface for a price-series analyzer.
pub trait Analyzer {
    /// `None` stands for "no series at all" and is rejected; an empty or
    /// short series is valid and simply produces no signals.
    fn analyze(&self, bars: Option<&[DailyBar]>) -> Result<AnalyzedSeries, AnalysisError>;
}

/// Short/long simple moving-average crossover analyzer.
#[derive(Debug, Clone, Copy)]
pub struct TrendAnalyzer {
    short_window: usize,
    long_window: usize,
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self {
            short_window: DEFAULT_SHORT_WINDOW,
            long_window: DEFAULT_LONG_WINDOW,
        }
    }
}

impl TrendAnalyzer {
    pub fn new(short_window: usize, long_window: usize) -> Result<Self, AnalysisError> {
        if short_window == 0 || short_window >= long_window {
            return Err(AnalysisError::InvalidWindows {
                short: short_window,
                long: long_window,
            });
        }
        Ok(Self {
            short_window,
            long_window,
        })
    }
}

impl Analyzer for TrendAnalyzer {
    fn analyze(&self, bars: Option<&[DailyBar]>) -> Result<AnalyzedSeries, AnalysisError> {
        let bars = bars.ok_or(AnalysisError::MissingData)?;

        if let Some(index) = bars.windows(2).position(|w| w[0].date >= w[1].date) {
            return Err(AnalysisError::Unordered { index: index + 1 });
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let short = rolling_mean(&closes, self.short_window);
        let long = rolling_mean(&closes, self.long_window);

        let mut state = TrendState::NoTrend;
        let mut analyzed = Vec::with_capacity(bars.len());

        for (i, bar) in bars.iter().enumerate() {
            let signal = match (short[i], long[i]) {
                (Some(s), Some(l)) => step(&mut state, s, l, bar.close),
                _ => None,
            };
            analyzed.push(AnalyzedBar {
                bar: bar.clone(),
                short_ma: short[i],
                long_ma: long[i],
                signal,
            });
        }

        Ok(AnalyzedSeries {
            short_window: self.short_window,
            long_window: self.long_window,
            bars: analyzed,
            final_state: state,
        })
    }
}

/// Advances the trend state; fires only when the relationship flips.
fn step(state: &mut TrendState, short: f64, long: f64, close: f64) -> Option<Signal> {
    if short > long && *state != TrendState::Uptrend {
        *state = TrendState::Uptrend;
        Some(Signal::Buy(close))
    } else if short < long && *state != TrendState::Downtrend {
        *state = TrendState::Downtrend;
        Some(Signal::Sell(close))
    } else {
        None
    }
}
