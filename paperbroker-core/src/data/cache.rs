//! CSV cache layer for historical bars.
//!
//! Layout: `{cache_dir}/instrument={ID}/{interval}.csv`
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity validation on load (row parse, bar count > 0)
//! - Quarantine for unreadable files ({filename}.quarantined)
//! - Metadata sidecar per instrument+interval (hash, time range, source)

use super::source::{BarSource, DataError};
use crate::domain::{BarInterval, PriceBar};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata sidecar for one cached instrument+interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub instrument: String,
    pub interval: BarInterval,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: String,
    pub cached_at: DateTime<Utc>,
}

/// The CSV bar cache.
pub struct CsvCache {
    cache_dir: PathBuf,
}

impl CsvCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Directory for an instrument: `{cache_dir}/instrument={ID}/`
    fn instrument_dir(&self, instrument: &str) -> PathBuf {
        self.cache_dir.join(format!("instrument={instrument}"))
    }

    fn bars_path(&self, instrument: &str, interval: BarInterval) -> PathBuf {
        self.instrument_dir(instrument)
            .join(format!("{interval}.csv"))
    }

    fn meta_path(&self, instrument: &str, interval: BarInterval) -> PathBuf {
        self.instrument_dir(instrument)
            .join(format!("{interval}.meta.json"))
    }

    /// Write bars for an instrument+interval to the cache.
    ///
    /// The write is atomic: the CSV goes to a .tmp file first and is renamed
    /// into place, so a crashed run never leaves a half-written cache entry.
    pub fn write(
        &self,
        instrument: &str,
        interval: BarInterval,
        bars: &[PriceBar],
        source: &str,
    ) -> Result<(), DataError> {
        if bars.is_empty() {
            return Err(DataError::Cache("no bars to cache".into()));
        }

        let dir = self.instrument_dir(instrument);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::Cache(format!("failed to create dir: {e}")))?;

        let path = self.bars_path(instrument, interval);
        let tmp_path = path.with_extension("csv.tmp");

        write_csv(&tmp_path, bars)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Cache(format!("atomic rename failed: {e}"))
        })?;

        let meta = CacheMeta {
            instrument: instrument.to_string(),
            interval,
            start_time: bars[0].time,
            end_time: bars[bars.len() - 1].time,
            bar_count: bars.len(),
            data_hash: blake3::hash(
                &serde_json::to_vec(bars)
                    .map_err(|e| DataError::Cache(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            source: source.to_string(),
            cached_at: Utc::now(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::Cache(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(instrument, interval), meta_json)
            .map_err(|e| DataError::Cache(format!("meta write: {e}")))?;

        Ok(())
    }

    /// Load all cached bars for an instrument+interval, sorted ascending.
    ///
    /// An unreadable file is quarantined rather than failing the run.
    pub fn load(
        &self,
        instrument: &str,
        interval: BarInterval,
    ) -> Result<Vec<PriceBar>, DataError> {
        let path = self.bars_path(instrument, interval);
        if !path.exists() {
            return Err(DataError::NoBars {
                instrument: instrument.to_string(),
            });
        }

        let mut bars = match read_csv(&path) {
            Ok(bars) => bars,
            Err(e) => {
                let quarantine = path.with_extension("csv.quarantined");
                log::warn!(
                    "quarantining unreadable cache file {}: {e}",
                    path.display()
                );
                let _ = fs::rename(&path, &quarantine);
                return Err(DataError::NoBars {
                    instrument: instrument.to_string(),
                });
            }
        };

        if bars.is_empty() {
            return Err(DataError::NoBars {
                instrument: instrument.to_string(),
            });
        }

        bars.sort_by_key(|b| b.time);
        Ok(bars)
    }

    /// Metadata for a cached instrument+interval, if present.
    pub fn get_meta(&self, instrument: &str, interval: BarInterval) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(instrument, interval)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Whether cached data fully covers `[from, to)`.
    pub fn covers_range(
        &self,
        instrument: &str,
        interval: BarInterval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> bool {
        match self.get_meta(instrument, interval) {
            None => false,
            // end_time is the last bar's timestamp; it covers one interval past it.
            Some(meta) => {
                meta.start_time <= from && meta.end_time + interval.duration() >= to
            }
        }
    }

    /// List metadata sidecars for every cached instrument.
    pub fn list(&self) -> Vec<CacheMeta> {
        let mut metas = Vec::new();
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return metas;
        };
        for entry in entries.flatten() {
            let Ok(files) = fs::read_dir(entry.path()) else {
                continue;
            };
            for file in files.flatten() {
                let path = file.path();
                if path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".meta.json"))
                {
                    if let Ok(content) = fs::read_to_string(&path) {
                        if let Ok(meta) = serde_json::from_str::<CacheMeta>(&content) {
                            metas.push(meta);
                        }
                    }
                }
            }
        }
        metas
    }
}

/// A bar source that serves from the cache and falls back to an inner source,
/// writing fetched bars through to the cache.
pub struct CachedBarSource<S> {
    cache: CsvCache,
    inner: S,
}

impl<S: BarSource> CachedBarSource<S> {
    pub fn new(cache_dir: impl Into<PathBuf>, inner: S) -> Self {
        Self {
            cache: CsvCache::new(cache_dir),
            inner,
        }
    }
}

impl<S: BarSource> BarSource for CachedBarSource<S> {
    fn name(&self) -> &str {
        "csv-cache"
    }

    fn load_bars(
        &self,
        instrument: &str,
        interval: BarInterval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>, DataError> {
        let bars = if self.cache.covers_range(instrument, interval, from, to) {
            self.cache.load(instrument, interval)?
        } else {
            let fetched = self.inner.load_bars(instrument, interval, from, to)?;
            self.cache
                .write(instrument, interval, &fetched, self.inner.name())?;
            fetched
        };

        let windowed: Vec<PriceBar> = bars
            .into_iter()
            .filter(|b| b.time >= from && b.time < to)
            .collect();
        if windowed.is_empty() {
            return Err(DataError::NoBars {
                instrument: instrument.to_string(),
            });
        }
        Ok(windowed)
    }
}

// ── CSV I/O helpers ─────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct BarRow {
    time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

fn write_csv(path: &Path, bars: &[PriceBar]) -> Result<(), DataError> {
    let mut writer =
        csv::Writer::from_path(path).map_err(|e| DataError::Cache(format!("create csv: {e}")))?;
    for bar in bars {
        writer
            .serialize(BarRow {
                time: bar.time,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            })
            .map_err(|e| DataError::Cache(format!("write csv row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| DataError::Cache(format!("flush csv: {e}")))?;
    Ok(())
}

fn read_csv(path: &Path) -> Result<Vec<PriceBar>, DataError> {
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| DataError::Cache(format!("open csv: {e}")))?;
    let mut bars = Vec::new();
    for row in reader.deserialize::<BarRow>() {
        let row = row.map_err(|e| DataError::Validation(format!("csv row: {e}")))?;
        bars.push(PriceBar {
            time: row.time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(bars)
}
