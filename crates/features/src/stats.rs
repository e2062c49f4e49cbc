//! Rolling mean and standard deviation.
//!
//! Keeps running sums over a fixed window so each push is O(1).

use std::collections::VecDeque;

/// Windowed mean / population standard deviation.
#[derive(Debug, Clone)]
pub struct RollingStats {
    /// Window size in observations.
    window: usize,
    /// Observations in the window.
    values: VecDeque<f64>,
    /// Running sum of values (for mean).
    sum: f64,
    /// Running sum of squared values (for variance).
    sum_sq: f64,
}

impl RollingStats {
    /// Create a new rolling calculator.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window),
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    /// Add an observation, evicting the oldest when the window is full.
    pub fn push(&mut self, value: f64) {
        if self.values.len() >= self.window {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
                self.sum_sq -= old * old;
            }
        }

        self.values.push_back(value);
        self.sum += value;
        self.sum_sq += value * value;
    }

    /// Mean of the window.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.sum / self.values.len() as f64)
    }

    /// Population standard deviation of the window.
    pub fn std_dev(&self) -> Option<f64> {
        let n = self.values.len();
        if n == 0 {
            return None;
        }

        let n_f = n as f64;
        let mean = self.sum / n_f;
        let variance = (self.sum_sq / n_f) - (mean * mean);

        // Handle numerical issues
        if variance <= 0.0 {
            Some(0.0)
        } else {
            Some(variance.sqrt())
        }
    }

    /// Check if the window is full.
    pub fn is_ready(&self) -> bool {
        self.values.len() >= self.window
    }

    /// Get the number of observations.
    pub fn count(&self) -> usize {
        self.values.len()
    }
}
