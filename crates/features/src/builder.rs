//! Wiring a configured feature set onto a bar bus.

use barfeed_core::{Bar, Config, Result};
use barfeed_ingestion::{EventBus, Subscriber};
use std::sync::Arc;
use tracing::info;

use crate::aggregator::{FeatureAggregator, FeatureMatrix};
use crate::registry::IndicatorRegistry;

/// Registries built from a `Config`, plus the aggregator over them.
#[derive(Debug)]
pub struct FeatureSet {
    symbols: Vec<String>,
    registries: Vec<Arc<IndicatorRegistry>>,
    aggregator: FeatureAggregator,
}

impl FeatureSet {
    /// Build one registry per configured field with every symbol registered.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let mut aggregator = FeatureAggregator::new(config.window_length);
        let mut registries = Vec::with_capacity(config.fields.len());
        for field in &config.fields {
            let registry = IndicatorRegistry::new(
                field.name.clone(),
                field.indicator.clone(),
                config.window_length,
            )?;
            for symbol in &config.symbols {
                registry.register_symbol(symbol)?;
            }
            let registry = Arc::new(registry);
            aggregator.add_registry(Arc::clone(&registry))?;
            registries.push(registry);
        }

        info!(
            fields = registries.len(),
            symbols = config.symbols.len(),
            window_length = config.window_length,
            "Built feature set"
        );
        Ok(Self {
            symbols: config.symbols.clone(),
            registries,
            aggregator,
        })
    }

    /// Subscribe every registry to `bus` and the bus to every symbol.
    ///
    /// Symbols the bus already follows are left as they are.
    pub fn attach(&self, bus: &EventBus<Bar>) {
        for registry in &self.registries {
            bus.add_subscriber(Arc::clone(registry) as Arc<dyn Subscriber<Bar>>);
        }
        let subscribed = self.symbols.iter().filter(|symbol| bus.subscribe(symbol)).count();
        info!(
            bus = bus.name(),
            registries = self.registries.len(),
            new_symbols = subscribed,
            "Attached feature set"
        );
    }

    /// Current feature matrix for `symbol`. See [`FeatureAggregator::state`]
    /// for consistency during live dispatch.
    pub fn state(&self, symbol: &str) -> Result<FeatureMatrix> {
        self.aggregator.state(symbol)
    }

    pub fn registries(&self) -> &[Arc<IndicatorRegistry>] {
        &self.registries
    }

    pub fn aggregator(&self) -> &FeatureAggregator {
        &self.aggregator
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }
}
