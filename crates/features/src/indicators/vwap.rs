//! Volume-weighted average price over a trailing window of bars.

use barfeed_core::{Bar, Error, Result};
use std::collections::VecDeque;

use super::ensure_finite;
use crate::window::RollingWindow;

/// Sum(volume * typical price) / Sum(volume) over the last `period` bars.
#[derive(Debug, Clone)]
pub struct Vwap {
    period: usize,
    values: RollingWindow,
    /// (volume, price) pairs, oldest first.
    window: VecDeque<(f64, f64)>,
    sum_volume: f64,
    sum_pv: f64,
    /// Bars in `window` with non-zero volume.
    nonzero: usize,
}

impl Vwap {
    /// Create a VWAP.
    pub fn new(period: usize, window_length: usize) -> Self {
        Self {
            period,
            values: RollingWindow::new(window_length, 0.0),
            window: VecDeque::with_capacity(period),
            sum_volume: 0.0,
            sum_pv: 0.0,
            nonzero: 0,
        }
    }

    /// Ingest one bar.
    ///
    /// Fails without changing state if the volume is negative or the window
    /// would hold no volume at all.
    pub fn update(&mut self, bar: &Bar) -> Result<()> {
        let volume = bar.volume;
        let price = bar.typical_price();
        ensure_finite("volume", volume)?;
        ensure_finite("typical price", price)?;
        if volume < 0.0 {
            return Err(Error::domain(format!("vwap volume must not be negative, got {volume}")));
        }

        let evicted = if self.window.len() >= self.period {
            self.window.front().copied()
        } else {
            None
        };
        let mut nonzero = self.nonzero + usize::from(volume > 0.0);
        if let Some((old_volume, _)) = evicted {
            nonzero -= usize::from(old_volume > 0.0);
        }
        if nonzero == 0 {
            return Err(Error::domain(format!(
                "vwap window of {} bars has zero volume",
                self.window.len() + usize::from(evicted.is_none())
            )));
        }

        // Rebuilt from the retained bars on eviction; a running difference
        // can cancel to zero.
        let (sum_volume, sum_pv) = if evicted.is_some() {
            self.window
                .iter()
                .skip(1)
                .chain(std::iter::once(&(volume, price)))
                .fold((0.0, 0.0), |(v, pv), &(vol, px)| (v + vol, pv + vol * px))
        } else {
            (self.sum_volume + volume, self.sum_pv + volume * price)
        };
        if sum_volume <= 0.0 {
            return Err(Error::domain(format!(
                "vwap window volume must be positive, got {sum_volume}"
            )));
        }

        if evicted.is_some() {
            self.window.pop_front();
        }
        self.window.push_back((volume, price));
        self.sum_volume = sum_volume;
        self.sum_pv = sum_pv;
        self.nonzero = nonzero;

        self.values.push(sum_pv / sum_volume);
        Ok(())
    }

    /// VWAP values.
    pub fn window(&self) -> &RollingWindow {
        &self.values
    }
}
