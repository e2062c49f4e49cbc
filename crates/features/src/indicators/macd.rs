//! MACD normalized by close.

use barfeed_core::{Bar, Error, Result};

use super::ema::ExponentialMovingAverage;
use super::ensure_finite;
use crate::window::RollingWindow;

/// 100 * (fast EMA - slow EMA) / close.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: ExponentialMovingAverage,
    slow: ExponentialMovingAverage,
    values: RollingWindow,
}

impl Macd {
    /// Create a MACD from two EMA periods.
    pub fn new(fast: usize, slow: usize, window_length: usize) -> Self {
        Self {
            fast: ExponentialMovingAverage::new(fast, 1),
            slow: ExponentialMovingAverage::new(slow, 1),
            values: RollingWindow::new(window_length, 0.0),
        }
    }

    /// Ingest one bar's close. A zero close is rejected before either EMA moves.
    pub fn update(&mut self, bar: &Bar) -> Result<()> {
        let close = bar.close;
        ensure_finite("close", close)?;
        if close == 0.0 {
            return Err(Error::domain("macd cannot normalize by a zero close"));
        }

        let fast = self.fast.push(close);
        let slow = self.slow.push(close);
        self.values.push(100.0 * (fast - slow) / close);
        Ok(())
    }

    /// MACD values.
    pub fn window(&self) -> &RollingWindow {
        &self.values
    }
}
