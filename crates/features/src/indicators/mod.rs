//! Per-symbol indicator units.
//!
//! Every unit consumes bars one at a time and exposes a fixed-length window
//! of its most recent outputs. Updates are all-or-nothing: a rejected bar
//! leaves the unit exactly as it was.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod price;
pub mod rsi;
pub mod sma;
pub mod volume;
pub mod vwap;

pub use bollinger::{BandSide, BollingerBand};
pub use ema::ExponentialMovingAverage;
pub use macd::Macd;
pub use price::LogReturn;
pub use rsi::{Rsi, RSI_NEUTRAL};
pub use sma::MovingAverage;
pub use volume::VolumeField;
pub use vwap::Vwap;

use barfeed_core::{Bar, Error, IndicatorSpec, Result};

use crate::window::RollingWindow;

fn ensure_finite(what: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::domain(format!("{what} must be finite, got {value}")))
    }
}

fn ensure_positive(what: &str, value: f64) -> Result<()> {
    ensure_finite(what, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(Error::domain(format!(
            "{what} must be positive for log normalization, got {value}"
        )))
    }
}

/// One indicator series for one symbol.
#[derive(Debug, Clone)]
pub enum Indicator {
    Price(LogReturn),
    Volume(VolumeField),
    Sma(MovingAverage),
    Ema(ExponentialMovingAverage),
    Rsi(Rsi),
    Macd(Macd),
    Vwap(Vwap),
    Bollinger(BollingerBand),
}

impl Indicator {
    /// Build a fresh unit for `spec`.
    pub fn new(spec: &IndicatorSpec, window_length: usize) -> Result<Self> {
        if window_length == 0 {
            return Err(Error::config("window_length must be at least 1"));
        }
        spec.validate()?;

        let unit = match *spec {
            IndicatorSpec::Open | IndicatorSpec::High | IndicatorSpec::Low | IndicatorSpec::Close => {
                let field = spec
                    .price_field()
                    .ok_or_else(|| Error::config("price indicator without a price field"))?;
                Indicator::Price(LogReturn::new(field, window_length))
            }
            IndicatorSpec::Volume => Indicator::Volume(VolumeField::new(window_length)),
            IndicatorSpec::Sma { period } => Indicator::Sma(MovingAverage::new(period, window_length)),
            IndicatorSpec::Ema { period } => {
                Indicator::Ema(ExponentialMovingAverage::new(period, window_length))
            }
            IndicatorSpec::Rsi { period } => Indicator::Rsi(Rsi::new(period, window_length)),
            IndicatorSpec::Macd { fast, slow } => Indicator::Macd(Macd::new(fast, slow, window_length)),
            IndicatorSpec::Vwap { period } => Indicator::Vwap(Vwap::new(period, window_length)),
            IndicatorSpec::BollingerUpper { period, num_std } => Indicator::Bollinger(
                BollingerBand::new(BandSide::Upper, period, num_std, window_length),
            ),
            IndicatorSpec::BollingerLower { period, num_std } => Indicator::Bollinger(
                BollingerBand::new(BandSide::Lower, period, num_std, window_length),
            ),
        };
        Ok(unit)
    }

    /// Ingest one bar.
    pub fn update(&mut self, bar: &Bar) -> Result<()> {
        match self {
            Indicator::Price(unit) => unit.update(bar),
            Indicator::Volume(unit) => unit.update(bar),
            Indicator::Sma(unit) => unit.update(bar),
            Indicator::Ema(unit) => unit.update(bar),
            Indicator::Rsi(unit) => unit.update(bar),
            Indicator::Macd(unit) => unit.update(bar),
            Indicator::Vwap(unit) => unit.update(bar),
            Indicator::Bollinger(unit) => unit.update(bar),
        }
    }

    fn window(&self) -> &RollingWindow {
        match self {
            Indicator::Price(unit) => unit.window(),
            Indicator::Volume(unit) => unit.window(),
            Indicator::Sma(unit) => unit.window(),
            Indicator::Ema(unit) => unit.window(),
            Indicator::Rsi(unit) => unit.window(),
            Indicator::Macd(unit) => unit.window(),
            Indicator::Vwap(unit) => unit.window(),
            Indicator::Bollinger(unit) => unit.window(),
        }
    }

    /// Current window, oldest first, always `window_length` long.
    pub fn data(&self) -> Vec<f64> {
        self.window().values()
    }

    /// Most recent output, if any bar has been accepted.
    pub fn latest(&self) -> Option<f64> {
        self.window().latest()
    }

    /// Number of values exposed by `data`.
    pub fn window_length(&self) -> usize {
        self.window().capacity()
    }

    /// Short kind name for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Indicator::Price(unit) => unit.field().as_str(),
            Indicator::Volume(_) => "volume",
            Indicator::Sma(_) => "sma",
            Indicator::Ema(_) => "ema",
            Indicator::Rsi(_) => "rsi",
            Indicator::Macd(_) => "macd",
            Indicator::Vwap(_) => "vwap",
            Indicator::Bollinger(unit) => match unit.side() {
                BandSide::Upper => "bb_upper",
                BandSide::Lower => "bb_lower",
            },
        }
    }
}
