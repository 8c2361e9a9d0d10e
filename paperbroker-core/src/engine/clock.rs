//! BarFeed — the virtual clock over a loaded bar sequence.
//!
//! The cursor starts *before* the first bar; `tick()` advances it exactly one
//! bar. Once the window is exhausted, `tick()` keeps returning false without
//! touching any state.

use crate::domain::PriceBar;
use chrono::{DateTime, Utc};

pub struct BarFeed {
    bars: Vec<PriceBar>,
    /// Index of the current bar; None until the first successful tick.
    cursor: Option<usize>,
}

impl BarFeed {
    pub fn new(bars: Vec<PriceBar>) -> Self {
        Self { bars, cursor: None }
    }

    /// Advance one bar. Returns false when the window is exhausted; repeated
    /// calls at the end stay false and change nothing.
    pub fn tick(&mut self) -> bool {
        let next = match self.cursor {
            None => 0,
            Some(i) => i + 1,
        };
        if next >= self.bars.len() {
            return false;
        }
        self.cursor = Some(next);
        true
    }

    /// Timestamp of the current bar; None before the first tick.
    pub fn current_time(&self) -> Option<DateTime<Utc>> {
        self.bar(0).map(|b| b.time)
    }

    /// Bar at `cursor + offset` (0 = current, -1 = previous), or None when out
    /// of range or before the first tick.
    pub fn bar(&self, offset: i64) -> Option<&PriceBar> {
        let cursor = self.cursor? as i64;
        let index = cursor + offset;
        if index < 0 {
            return None;
        }
        self.bars.get(index as usize)
    }

    /// The full loaded window. Used for pre-tick initial pricing.
    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }
}
