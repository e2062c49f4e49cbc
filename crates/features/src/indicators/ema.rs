//! Exponential moving average.

use barfeed_core::{Bar, Result};

use super::ensure_finite;
use crate::window::RollingWindow;

/// EMA of closes with multiplier 2 / (period + 1), seeded by the first close.
#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    multiplier: f64,
    values: RollingWindow,
    ema: Option<f64>,
}

impl ExponentialMovingAverage {
    /// Create an EMA.
    pub fn new(period: usize, window_length: usize) -> Self {
        Self {
            multiplier: 2.0 / (period as f64 + 1.0),
            values: RollingWindow::new(window_length, 0.0),
            ema: None,
        }
    }

    /// Ingest one bar's close.
    pub fn update(&mut self, bar: &Bar) -> Result<()> {
        ensure_finite("close", bar.close)?;
        self.push(bar.close);
        Ok(())
    }

    /// Advance with a raw input and return the new EMA.
    pub(crate) fn push(&mut self, x: f64) -> f64 {
        let next = match self.ema {
            Some(prev) => prev * (1.0 - self.multiplier) + x * self.multiplier,
            None => x,
        };
        self.ema = Some(next);
        self.values.push(next);
        next
    }

    /// EMA values.
    pub fn window(&self) -> &RollingWindow {
        &self.values
    }

    /// Smoothing multiplier.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}
