//! Feature aggregation.
//!
//! Combines a set of registries into one time-by-feature matrix per symbol.

use barfeed_core::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::registry::IndicatorRegistry;

/// Feature state for one symbol.
///
/// Row 0 is the oldest time step; columns follow registry insertion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// (time steps, features)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    /// Feature vector at time step `t`.
    pub fn row(&self, t: usize) -> Option<&[f64]> {
        self.rows.get(t).map(Vec::as_slice)
    }

    /// One feature over time, oldest first.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Most recent feature vector.
    pub fn latest(&self) -> Option<&[f64]> {
        self.rows.last().map(Vec::as_slice)
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }
}

/// Ordered collection of registries sharing one window length.
#[derive(Debug)]
pub struct FeatureAggregator {
    window_length: usize,
    registries: Vec<Arc<IndicatorRegistry>>,
}

impl FeatureAggregator {
    /// Create an empty aggregator.
    pub fn new(window_length: usize) -> Self {
        Self {
            window_length,
            registries: Vec::new(),
        }
    }

    /// Append a registry as the next feature column.
    pub fn add_registry(&mut self, registry: Arc<IndicatorRegistry>) -> Result<()> {
        if registry.window_length() != self.window_length {
            return Err(Error::WindowMismatch {
                registry: registry.name().to_string(),
                expected: self.window_length,
                found: registry.window_length(),
            });
        }
        info!(
            registry = registry.name(),
            column = self.registries.len(),
            "Added registry to aggregator"
        );
        self.registries.push(registry);
        Ok(())
    }

    /// Current feature matrix for `symbol`.
    ///
    /// Fails with `UnknownSymbol` if any registry does not track the symbol.
    ///
    /// Each registry is read under its own lock. A call that races a bus
    /// dispatch may see the newest bar in some columns and the previous bar
    /// in others; read between events for a row-consistent snapshot.
    pub fn state(&self, symbol: &str) -> Result<FeatureMatrix> {
        let series = self
            .registries
            .iter()
            .map(|registry| registry.data(symbol))
            .collect::<Result<Vec<_>>>()?;

        let rows = (0..self.window_length)
            .map(|t| series.iter().map(|values| values[t]).collect())
            .collect();

        Ok(FeatureMatrix {
            columns: self.columns(),
            rows,
        })
    }

    /// Column names in order.
    pub fn columns(&self) -> Vec<String> {
        self.registries.iter().map(|r| r.name().to_string()).collect()
    }

    /// Number of registries (feature columns).
    pub fn len(&self) -> usize {
        self.registries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn registries(&self) -> &[Arc<IndicatorRegistry>] {
        &self.registries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barfeed_core::{Bar, IndicatorSpec};

    fn make_bar(close: f64) -> Bar {
        Bar {
            symbol: "AAPL".to_string(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
            ts_ms: 0,
        }
    }

    fn registry(name: &str, spec: IndicatorSpec, window_length: usize) -> Arc<IndicatorRegistry> {
        let registry = IndicatorRegistry::new(name, spec, window_length).unwrap();
        registry.register_symbol("AAPL").unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_shape_and_column_order() {
        let mut aggregator = FeatureAggregator::new(4);
        let sma = registry("sma2", IndicatorSpec::Sma { period: 2 }, 4);
        let rsi = registry("rsi3", IndicatorSpec::Rsi { period: 3 }, 4);
        aggregator.add_registry(Arc::clone(&sma)).unwrap();
        aggregator.add_registry(Arc::clone(&rsi)).unwrap();

        for close in [10.0, 12.0] {
            sma.update(&make_bar(close)).unwrap();
            rsi.update(&make_bar(close)).unwrap();
        }

        let state = aggregator.state("AAPL").unwrap();
        assert_eq!(state.shape(), (4, 2));
        assert_eq!(state.columns, vec!["sma2".to_string(), "rsi3".to_string()]);
        assert_eq!(state.row(0), Some(&[0.0, 50.0][..]));
        assert_eq!(state.latest(), Some(&[11.0, 100.0][..]));
        assert_eq!(state.column("sma2").unwrap(), sma.data("AAPL").unwrap());
        assert!(state.column("missing").is_none());
        assert_eq!(aggregator.len(), 2);
    }

    #[test]
    fn test_state_is_repeatable() {
        let mut aggregator = FeatureAggregator::new(3);
        let close = registry("close", IndicatorSpec::Close, 3);
        aggregator.add_registry(Arc::clone(&close)).unwrap();
        close.update(&make_bar(100.0)).unwrap();

        let first = aggregator.state("AAPL").unwrap();
        let second = aggregator.state("AAPL").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.rows().len(), 3);
    }

    #[test]
    fn test_window_mismatch() {
        let mut aggregator = FeatureAggregator::new(10);
        let err = aggregator
            .add_registry(registry("ema5", IndicatorSpec::Ema { period: 5 }, 5))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::WindowMismatch { expected: 10, found: 5, .. }
        ));
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_unknown_symbol() {
        let mut aggregator = FeatureAggregator::new(2);
        aggregator
            .add_registry(registry("close", IndicatorSpec::Close, 2))
            .unwrap();
        assert!(matches!(
            aggregator.state("TSLA").unwrap_err(),
            Error::UnknownSymbol { .. }
        ));
    }

    #[test]
    fn test_empty_aggregator() {
        let aggregator = FeatureAggregator::new(3);
        let state = aggregator.state("AAPL").unwrap();
        assert_eq!(state.shape(), (3, 0));
        assert!(state.latest().unwrap().is_empty());
    }

    #[test]
    fn test_serializes() {
        let matrix = FeatureMatrix {
            columns: vec!["close".to_string()],
            rows: vec![vec![0.5]],
        };
        let json = serde_json::to_string(&matrix).unwrap();
        assert_eq!(json, r#"{"columns":["close"],"rows":[[0.5]]}"#);
    }
}
