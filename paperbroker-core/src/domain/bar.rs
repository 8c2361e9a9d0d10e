//! PriceBar — the fundamental market data unit — and the bar interval.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single instrument over one interval.
///
/// Bars are immutable once loaded and ordered ascending by `time`. The engine
/// only ever reads them; there is no adjustment or resampling step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Basic OHLC sanity check: high >= low, range contains open and close.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}

/// Width of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarInterval {
    Min1,
    Min5,
    Min15,
    Hour1,
    Day1,
}

impl BarInterval {
    pub fn duration(self) -> Duration {
        match self {
            BarInterval::Min1 => Duration::minutes(1),
            BarInterval::Min5 => Duration::minutes(5),
            BarInterval::Min15 => Duration::minutes(15),
            BarInterval::Hour1 => Duration::hours(1),
            BarInterval::Day1 => Duration::days(1),
        }
    }

    /// Stable name used in cache file paths.
    pub fn as_str(self) -> &'static str {
        match self {
            BarInterval::Min1 => "1min",
            BarInterval::Min5 => "5min",
            BarInterval::Min15 => "15min",
            BarInterval::Hour1 => "1hour",
            BarInterval::Day1 => "1day",
        }
    }
}

impl std::fmt::Display for BarInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
