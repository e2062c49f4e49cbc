//! Configuration structures for the barfeed system.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::PriceField;

/// Main configuration: which indicator fields to compute over which symbols.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of most recent values exposed per field and symbol.
    pub window_length: usize,
    /// Symbols registered against every field.
    pub symbols: Vec<String>,
    /// Indicator fields, in feature-column order.
    pub fields: Vec<FieldConfig>,
    /// Event bus configuration.
    pub bus: BusConfig,
}

impl Default for Config {
    fn default() -> Self {
        let fields = [
            IndicatorSpec::Open,
            IndicatorSpec::Low,
            IndicatorSpec::High,
            IndicatorSpec::Close,
            IndicatorSpec::Volume,
            IndicatorSpec::Sma { period: 10 },
            IndicatorSpec::Sma { period: 30 },
            IndicatorSpec::Ema { period: 10 },
            IndicatorSpec::Rsi { period: 14 },
            IndicatorSpec::Macd { fast: 12, slow: 26 },
        ]
        .into_iter()
        .map(FieldConfig::from)
        .collect();

        Self {
            window_length: 10,
            symbols: vec!["AAPL".to_string(), "TSLA".to_string()],
            fields,
            bus: BusConfig::default(),
        }
    }
}

impl Config {
    /// Parse a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check the configuration for values no component could accept.
    pub fn validate(&self) -> Result<()> {
        if self.window_length == 0 {
            return Err(Error::config("window_length must be at least 1"));
        }

        let mut names = HashSet::new();
        for field in &self.fields {
            field.indicator.validate()?;
            if !names.insert(field.name.as_str()) {
                return Err(Error::config(format!("duplicate field name {}", field.name)));
            }
        }

        let mut symbols = HashSet::new();
        for symbol in &self.symbols {
            if symbol.trim().is_empty() {
                return Err(Error::config("symbols must not be empty"));
            }
            if !symbols.insert(symbol.as_str()) {
                return Err(Error::config(format!("duplicate symbol {symbol}")));
            }
        }

        self.bus.validate()
    }
}

/// One feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Column name.
    pub name: String,
    /// Indicator computed for this column.
    #[serde(flatten)]
    pub indicator: IndicatorSpec,
}

impl From<IndicatorSpec> for FieldConfig {
    fn from(indicator: IndicatorSpec) -> Self {
        Self {
            name: indicator.default_name(),
            indicator,
        }
    }
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_band_period() -> usize {
    20
}

fn default_num_std() -> f64 {
    2.0
}

/// Indicator kind and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorSpec {
    /// Log-return of the open against the bar's open.
    Open,
    /// Log-return of the high against the bar's open.
    High,
    /// Log-return of the low against the bar's open.
    Low,
    /// Log-return of the close against the bar's open.
    Close,
    /// Log of volume against its trailing baseline.
    Volume,
    /// Simple moving average of closes.
    Sma { period: usize },
    /// Exponential moving average of closes.
    Ema { period: usize },
    /// Relative strength index.
    Rsi { period: usize },
    /// MACD normalized by close, in percent.
    Macd {
        #[serde(default = "default_macd_fast")]
        fast: usize,
        #[serde(default = "default_macd_slow")]
        slow: usize,
    },
    /// Volume-weighted average price.
    Vwap { period: usize },
    /// Upper Bollinger band.
    BollingerUpper {
        #[serde(default = "default_band_period")]
        period: usize,
        #[serde(default = "default_num_std")]
        num_std: f64,
    },
    /// Lower Bollinger band.
    BollingerLower {
        #[serde(default = "default_band_period")]
        period: usize,
        #[serde(default = "default_num_std")]
        num_std: f64,
    },
}

impl IndicatorSpec {
    /// The price field for pass-through kinds.
    pub fn price_field(&self) -> Option<PriceField> {
        match self {
            IndicatorSpec::Open => Some(PriceField::Open),
            IndicatorSpec::High => Some(PriceField::High),
            IndicatorSpec::Low => Some(PriceField::Low),
            IndicatorSpec::Close => Some(PriceField::Close),
            _ => None,
        }
    }

    /// Column name used when none is configured.
    pub fn default_name(&self) -> String {
        match self {
            IndicatorSpec::Open => PriceField::Open.as_str().to_string(),
            IndicatorSpec::High => PriceField::High.as_str().to_string(),
            IndicatorSpec::Low => PriceField::Low.as_str().to_string(),
            IndicatorSpec::Close => PriceField::Close.as_str().to_string(),
            IndicatorSpec::Volume => "volume".to_string(),
            IndicatorSpec::Sma { period } => format!("sma{period}"),
            IndicatorSpec::Ema { period } => format!("ema{period}"),
            IndicatorSpec::Rsi { period } => format!("rsi{period}"),
            IndicatorSpec::Macd { fast, slow } => format!("macd{fast}_{slow}"),
            IndicatorSpec::Vwap { period } => format!("vwap{period}"),
            IndicatorSpec::BollingerUpper { period, .. } => format!("bb_upper{period}"),
            IndicatorSpec::BollingerLower { period, .. } => format!("bb_lower{period}"),
        }
    }

    /// Check parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            IndicatorSpec::Sma { period }
            | IndicatorSpec::Ema { period }
            | IndicatorSpec::Rsi { period }
            | IndicatorSpec::Vwap { period } => check_period(self, *period),
            IndicatorSpec::Macd { fast, slow } => {
                check_period(self, *fast)?;
                check_period(self, *slow)?;
                if fast >= slow {
                    return Err(Error::config(format!(
                        "macd fast period {fast} must be shorter than slow period {slow}"
                    )));
                }
                Ok(())
            }
            IndicatorSpec::BollingerUpper { period, num_std }
            | IndicatorSpec::BollingerLower { period, num_std } => {
                check_period(self, *period)?;
                if !(num_std.is_finite() && *num_std > 0.0) {
                    return Err(Error::config(format!(
                        "{} num_std must be positive, got {num_std}",
                        self.default_name()
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn check_period(spec: &IndicatorSpec, period: usize) -> Result<()> {
    if period == 0 {
        return Err(Error::config(format!(
            "{} period must be at least 1",
            spec.default_name()
        )));
    }
    Ok(())
}

/// Event bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// How long the listener waits on the source before re-checking for
    /// cancellation (ms).
    pub poll_interval_ms: u64,
    /// Upper bound on how long `stop` waits for the listener (ms).
    pub stop_timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            stop_timeout_ms: 5_000,
        }
    }
}

impl BusConfig {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Stop timeout as a duration.
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.stop_timeout_ms == 0 {
            return Err(Error::config("stop_timeout_ms must be positive"));
        }
        Ok(())
    }
}
