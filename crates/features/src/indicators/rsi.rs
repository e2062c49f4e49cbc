//! Relative strength index.

use barfeed_core::{Bar, Result};
use std::collections::VecDeque;

use super::ensure_finite;
use crate::window::RollingWindow;

/// Neutral RSI reading, also used as window padding.
pub const RSI_NEUTRAL: f64 = 50.0;

/// RSI over the last `period` close-to-close deltas, using simple means of
/// gains and losses.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    values: RollingWindow,
    /// Signed deltas, oldest first.
    deltas: VecDeque<f64>,
    prev_close: Option<f64>,
}

impl Rsi {
    /// Create an RSI.
    pub fn new(period: usize, window_length: usize) -> Self {
        Self {
            period,
            values: RollingWindow::new(window_length, RSI_NEUTRAL),
            deltas: VecDeque::with_capacity(period),
            prev_close: None,
        }
    }

    /// Ingest one bar's close. The first observation emits the neutral value.
    pub fn update(&mut self, bar: &Bar) -> Result<()> {
        let close = bar.close;
        ensure_finite("close", close)?;

        let value = match self.prev_close {
            Some(prev) => {
                if self.deltas.len() >= self.period {
                    self.deltas.pop_front();
                }
                self.deltas.push_back(close - prev);
                self.current()
            }
            None => RSI_NEUTRAL,
        };

        self.prev_close = Some(close);
        self.values.push(value);
        Ok(())
    }

    /// RSI of the deltas currently held.
    fn current(&self) -> f64 {
        if self.deltas.is_empty() {
            return RSI_NEUTRAL;
        }

        let (gains, losses) = self.deltas.iter().fold((0.0, 0.0), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });
        let n = self.deltas.len() as f64;
        let avg_gain = gains / n;
        let avg_loss = losses / n;

        if avg_loss == 0.0 {
            return if avg_gain == 0.0 { RSI_NEUTRAL } else { 100.0 };
        }
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }

    /// RSI values.
    pub fn window(&self) -> &RollingWindow {
        &self.values
    }
}
