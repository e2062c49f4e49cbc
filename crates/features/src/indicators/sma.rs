//! Simple moving average.

use barfeed_core::{Bar, Result};
use std::collections::VecDeque;

use super::ensure_finite;
use crate::window::RollingWindow;

/// Simple moving average of closes, updated incrementally.
///
/// Before `period` observations the running mean is extended in place; after
/// that the value leaving the period is swapped for the new one.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    period: usize,
    values: RollingWindow,
    /// The last `period` inputs, oldest first.
    history: VecDeque<f64>,
    avg: f64,
    count: u64,
}

impl MovingAverage {
    /// Create a moving average.
    pub fn new(period: usize, window_length: usize) -> Self {
        Self {
            period,
            values: RollingWindow::new(window_length, 0.0),
            history: VecDeque::with_capacity(period),
            avg: 0.0,
            count: 0,
        }
    }

    /// Ingest one bar's close.
    pub fn update(&mut self, bar: &Bar) -> Result<()> {
        ensure_finite("close", bar.close)?;
        self.push(bar.close);
        Ok(())
    }

    /// Advance with a raw input and return the new average.
    pub(crate) fn push(&mut self, x: f64) -> f64 {
        if (self.count as usize) < self.period {
            let n = self.count as f64;
            self.avg = self.avg * (n / (n + 1.0)) + x / (n + 1.0);
        } else if let Some(oldest) = self.history.pop_front() {
            self.avg += (x - oldest) / self.period as f64;
        }

        self.history.push_back(x);
        self.count += 1;
        self.values.push(self.avg);
        self.avg
    }

    /// Averages.
    pub fn window(&self) -> &RollingWindow {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bar(close: f64) -> Bar {
        Bar {
            symbol: "AAPL".to_string(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
            ts_ms: 0,
        }
    }

    #[test]
    fn test_warmup_mean() {
        // period 3, window 5, closes 10, 11, 9
        let mut sma = MovingAverage::new(3, 5);
        for close in [10.0, 11.0, 9.0] {
            sma.update(&make_bar(close)).unwrap();
        }

        let data = sma.window().values();
        assert_eq!(data.len(), 5);
        assert_eq!(&data[..2], &[0.0, 0.0]);
        assert!((data[2] - 10.0).abs() < 1e-10);
        assert!((data[3] - 10.5).abs() < 1e-10);
        assert!((sma.window().latest().unwrap() - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_rolls_after_period() {
        let mut sma = MovingAverage::new(3, 2);
        for close in [10.0, 11.0, 9.0, 13.0, 5.0] {
            sma.update(&make_bar(close)).unwrap();
        }
        // (11 + 9 + 13) / 3, (9 + 13 + 5) / 3
        let data = sma.window().values();
        assert!((data[0] - 11.0).abs() < 1e-10);
        assert!((data[1] - 9.0).abs() < 1e-10);
    }

    #[test]
    fn test_converges_to_constant() {
        let mut sma = MovingAverage::new(4, 3);
        for close in [50.0, 70.0, 20.0] {
            sma.update(&make_bar(close)).unwrap();
        }
        for _ in 0..4 {
            sma.update(&make_bar(42.0)).unwrap();
        }
        assert!((sma.window().latest().unwrap() - 42.0).abs() < 1e-10);
    }

    #[test]
    fn test_matches_closed_form() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + ((i * 7) % 11) as f64).collect();
        let mut sma = MovingAverage::new(5, 1);
        for (i, &close) in closes.iter().enumerate() {
            sma.update(&make_bar(close)).unwrap();
            let start = (i + 1).saturating_sub(5);
            let window = &closes[start..=i];
            let expected = window.iter().sum::<f64>() / window.len() as f64;
            assert!((sma.window().latest().unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rejects_nan() {
        let mut sma = MovingAverage::new(3, 3);
        assert!(sma.update(&make_bar(f64::NAN)).is_err());
        assert_eq!(sma.window().observed(), 0);
    }
}
