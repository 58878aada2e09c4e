// Analyzer module: rolling indicators and the crossover signal state machine.

pub mod indicators;
pub mod trend;

pub use trend::{Analyzer, TrendAnalyzer};
