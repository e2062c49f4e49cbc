//! Named indicator series tracked per symbol.

use barfeed_core::{Bar, Error, IndicatorSpec, Result};
use barfeed_ingestion::Subscriber;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

use crate::indicators::Indicator;

/// One indicator kind, one unit per registered symbol.
///
/// Registration and updates take the write lock; `data` takes the read lock,
/// so symbols can be added while a bus is streaming into the registry.
#[derive(Debug)]
pub struct IndicatorRegistry {
    name: String,
    spec: IndicatorSpec,
    window_length: usize,
    units: RwLock<HashMap<String, Indicator>>,
}

impl IndicatorRegistry {
    /// Create an empty registry. Fails if `spec` cannot build a unit.
    pub fn new(name: impl Into<String>, spec: IndicatorSpec, window_length: usize) -> Result<Self> {
        Indicator::new(&spec, window_length)?;
        Ok(Self {
            name: name.into(),
            spec,
            window_length,
            units: RwLock::new(HashMap::new()),
        })
    }

    /// Start tracking `symbol` with a fresh unit.
    pub fn register_symbol(&self, symbol: &str) -> Result<()> {
        let mut units = self.units.write();
        if units.contains_key(symbol) {
            return Err(Error::duplicate_symbol(&self.name, symbol));
        }
        let unit = Indicator::new(&self.spec, self.window_length)?;
        debug!(registry = %self.name, symbol, kind = unit.kind_name(), "Registered symbol");
        units.insert(symbol.to_string(), unit);
        Ok(())
    }

    /// Route a bar to its symbol's unit.
    pub fn update(&self, bar: &Bar) -> Result<()> {
        let mut units = self.units.write();
        let unit = units
            .get_mut(&bar.symbol)
            .ok_or_else(|| Error::unknown_symbol(&self.name, &bar.symbol))?;
        unit.update(bar)
    }

    /// Current window for `symbol`, oldest first.
    pub fn data(&self, symbol: &str) -> Result<Vec<f64>> {
        self.units
            .read()
            .get(symbol)
            .map(Indicator::data)
            .ok_or_else(|| Error::unknown_symbol(&self.name, symbol))
    }

    pub fn is_registered(&self, symbol: &str) -> bool {
        self.units.read().contains_key(symbol)
    }

    /// Registered symbols, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.units.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn spec(&self) -> &IndicatorSpec {
        &self.spec
    }
}

impl Subscriber<Bar> for IndicatorRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &Bar) -> Result<()> {
        self.update(event)
    }
}
