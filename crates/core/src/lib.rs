//! Core types and configuration for the barfeed system.
//!
//! This crate provides shared types used across all other crates:
//! - Market event types (bars, trades)
//! - Configuration structures
//! - Common error types
//! - Logging setup

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{BusConfig, Config, FieldConfig, IndicatorSpec};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use types::*;
