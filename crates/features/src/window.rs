//! Fixed-capacity ring buffer of indicator outputs.

use std::collections::VecDeque;

/// Ring buffer that always reads back exactly `capacity` values.
///
/// Until `capacity` values have been pushed, reads are left-padded with the
/// fill value.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    /// Most recent values, oldest first.
    values: VecDeque<f64>,
    /// Maximum values kept.
    capacity: usize,
    /// Padding for missing observations.
    fill: f64,
}

impl RollingWindow {
    /// Create an empty window.
    pub fn new(capacity: usize, fill: f64) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            fill,
        }
    }

    /// Append a value, evicting the oldest when full.
    pub fn push(&mut self, value: f64) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Most recent value, if any.
    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Window contents, oldest first, padded to `capacity`.
    pub fn values(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.capacity);
        out.resize(self.capacity - self.values.len(), self.fill);
        out.extend(self.values.iter().copied());
        out
    }

    /// Iterate over observed values, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// Number of real observations held (at most `capacity`).
    pub fn observed(&self) -> usize {
        self.values.len()
    }

    /// Whether `capacity` observations are held.
    pub fn is_full(&self) -> bool {
        self.values.len() >= self.capacity
    }

    /// Window capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
