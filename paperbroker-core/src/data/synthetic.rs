//! Synthetic bar source — a seeded random walk for offline runs and tests.

use super::source::{BarSource, DataError};
use crate::domain::{BarInterval, PriceBar};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic random-walk generator. The same seed always produces the
/// same bar sequence, so simulations stay reproducible.
pub struct SyntheticSource {
    seed: u64,
    start_price: f64,
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start_price: 100.0,
        }
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }
}

impl BarSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn load_bars(
        &self,
        instrument: &str,
        interval: BarInterval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>, DataError> {
        if from >= to {
            return Err(DataError::NoBars {
                instrument: instrument.to_string(),
            });
        }

        // Per-instrument stream: same seed + same id => same walk.
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(instrument.as_bytes());
        let mut seed_bytes = [0u8; 32];
        hasher.finalize_xof().fill(&mut seed_bytes);
        let mut rng = StdRng::from_seed(seed_bytes);

        let step = interval.duration();
        let mut bars = Vec::new();
        let mut price = self.start_price;
        let mut time = from;

        while time < to {
            let drift: f64 = rng.gen_range(-1.0..1.0);
            let open = price;
            let close = (price + drift).max(1.0);
            let high = open.max(close) + rng.gen_range(0.0..0.5);
            let low = (open.min(close) - rng.gen_range(0.0..0.5)).max(0.5);
            bars.push(PriceBar {
                time,
                open,
                high,
                low,
                close,
                volume: rng.gen_range(1_000..100_000),
            });
            price = close;
            time += step;
        }

        if bars.is_empty() {
            return Err(DataError::NoBars {
                instrument: instrument.to_string(),
            });
        }
        Ok(bars)
    }
}
