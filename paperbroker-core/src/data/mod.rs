//! Data layer: bar source trait, CSV cache, synthetic generator.

pub mod cache;
pub mod source;
pub mod synthetic;

pub use cache::{CacheMeta, CachedBarSource, CsvCache};
pub use source::{BarSource, DataError};
pub use synthetic::SyntheticSource;
