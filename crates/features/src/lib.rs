//! Feature computation for the barfeed system.
//!
//! This crate handles:
//! - Rolling windows and running moments
//! - Per-symbol indicator units (log prices, averages, RSI, MACD, VWAP, bands)
//! - Indicator registries that consume bars from a bus
//! - Aggregation of registries into per-symbol feature matrices

pub mod aggregator;
pub mod builder;
pub mod indicators;
pub mod registry;
pub mod stats;
pub mod window;

pub use aggregator::{FeatureAggregator, FeatureMatrix};
pub use builder::FeatureSet;
pub use indicators::Indicator;
pub use registry::IndicatorRegistry;
pub use stats::RollingStats;
pub use window::RollingWindow;
