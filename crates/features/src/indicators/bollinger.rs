//! Bollinger bands.

use barfeed_core::{Bar, Result};

use super::ensure_finite;
use super::sma::MovingAverage;
use crate::stats::RollingStats;
use crate::window::RollingWindow;

/// Which band a unit tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandSide {
    Upper,
    Lower,
}

impl BandSide {
    fn sign(self) -> f64 {
        match self {
            BandSide::Upper => 1.0,
            BandSide::Lower => -1.0,
        }
    }
}

/// SMA ± k standard deviations of the SMA's own recent values.
///
/// The deviation is taken over the last `window_length` averages; until that
/// many bars have been seen the raw close is emitted instead.
#[derive(Debug, Clone)]
pub struct BollingerBand {
    side: BandSide,
    num_std: f64,
    sma: MovingAverage,
    spread: RollingStats,
    values: RollingWindow,
    window_length: usize,
    seen: usize,
}

impl BollingerBand {
    /// Create a band.
    pub fn new(side: BandSide, period: usize, num_std: f64, window_length: usize) -> Self {
        Self {
            side,
            num_std,
            sma: MovingAverage::new(period, window_length),
            spread: RollingStats::new(window_length),
            values: RollingWindow::new(window_length, 0.0),
            window_length,
            seen: 0,
        }
    }

    /// Ingest one bar's close.
    pub fn update(&mut self, bar: &Bar) -> Result<()> {
        let close = bar.close;
        ensure_finite("close", close)?;

        let avg = self.sma.push(close);
        self.spread.push(avg);
        self.seen += 1;

        let value = if self.seen <= self.window_length {
            close
        } else {
            let std = self.spread.std_dev().unwrap_or(0.0);
            avg + self.side.sign() * self.num_std * std
        };
        self.values.push(value);
        Ok(())
    }

    /// Band values.
    pub fn window(&self) -> &RollingWindow {
        &self.values
    }

    /// Tracked side.
    pub fn side(&self) -> BandSide {
        self.side
    }
}
