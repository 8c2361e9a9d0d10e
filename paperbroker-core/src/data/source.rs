//! Bar source trait and structured error types.
//!
//! The BarSource trait abstracts over where historical bars come from (CSV
//! cache, synthetic generator, an adapter's own downloader) so the engine can
//! swap implementations and mock for tests.

use crate::domain::{BarInterval, PriceBar};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no bars for instrument '{instrument}' in the requested window")]
    NoBars { instrument: String },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Loads historical bars for one instrument over a half-open window `[from, to)`.
pub trait BarSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch bars, ordered ascending by time. Must fail with
    /// [`DataError::NoBars`] when the window is empty.
    fn load_bars(
        &self,
        instrument: &str,
        interval: BarInterval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>, DataError>;
}
