//! Instrument reference data and the resolver seam.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Immutable instrument metadata.
///
/// `lot` is the number of units per tradable lot (e.g. 10 shares per lot);
/// all order quantities are expressed in lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: String,
    pub name: String,
    pub lot: u32,
    pub currency: String,
}

impl Instrument {
    pub fn new(id: impl Into<String>, name: impl Into<String>, lot: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            lot,
            currency: "usd".into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("instrument not found: {id}")]
    NotFound { id: String },
}

/// Resolves instrument ids to reference data.
///
/// Abstracts over wherever instrument metadata comes from so the engine can be
/// tested against a fixed set and adapters can plug in their own lookup.
pub trait InstrumentResolver {
    fn resolve(&self, id: &str) -> Result<Instrument, InstrumentError>;
}

/// In-memory resolver over a fixed instrument set.
#[derive(Debug, Default)]
pub struct StaticInstruments {
    instruments: HashMap<String, Instrument>,
}

impl StaticInstruments {
    pub fn new(instruments: impl IntoIterator<Item = Instrument>) -> Self {
        Self {
            instruments: instruments
                .into_iter()
                .map(|i| (i.id.clone(), i))
                .collect(),
        }
    }
}

impl InstrumentResolver for StaticInstruments {
    fn resolve(&self, id: &str) -> Result<Instrument, InstrumentError> {
        self.instruments
            .get(id)
            .cloned()
            .ok_or_else(|| InstrumentError::NotFound { id: id.to_string() })
    }
}
