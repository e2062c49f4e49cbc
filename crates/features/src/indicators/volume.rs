//! Log-normalized volume.

use barfeed_core::{Bar, Result};

use super::ensure_positive;
use crate::stats::RollingStats;
use crate::window::RollingWindow;

/// ln(volume / baseline), where the baseline is the mean of the previous
/// `window_length` volumes.
#[derive(Debug, Clone)]
pub struct VolumeField {
    values: RollingWindow,
    baseline: RollingStats,
}

impl VolumeField {
    /// Create a volume field.
    pub fn new(window_length: usize) -> Self {
        Self {
            values: RollingWindow::new(window_length, 0.0),
            baseline: RollingStats::new(window_length),
        }
    }

    /// Ingest one bar. The first observation has no baseline and emits 0.
    pub fn update(&mut self, bar: &Bar) -> Result<()> {
        ensure_positive("volume", bar.volume)?;

        let value = match self.baseline.mean() {
            Some(reference) => (bar.volume / reference).ln(),
            None => 0.0,
        };
        self.values.push(value);
        self.baseline.push(bar.volume);
        Ok(())
    }

    /// Normalized values.
    pub fn window(&self) -> &RollingWindow {
        &self.values
    }

    /// Current baseline, if any volume has been seen.
    pub fn baseline(&self) -> Option<f64> {
        self.baseline.mean()
    }
}
