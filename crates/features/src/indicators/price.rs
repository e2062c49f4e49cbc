//! Log-normalized price pass-through (open/high/low/close).

use barfeed_core::{Bar, PriceField, Result};

use super::ensure_positive;
use crate::window::RollingWindow;

/// ln(price / open) per bar. The reference is the bar's own open, so no
/// reference history is kept.
#[derive(Debug, Clone)]
pub struct LogReturn {
    /// Which price component is normalized.
    field: PriceField,
    /// Normalized values.
    values: RollingWindow,
}

impl LogReturn {
    /// Create a log-return field.
    pub fn new(field: PriceField, window_length: usize) -> Self {
        Self {
            field,
            values: RollingWindow::new(window_length, 0.0),
        }
    }

    /// Ingest one bar. Non-positive prices are rejected without touching state.
    pub fn update(&mut self, bar: &Bar) -> Result<()> {
        let raw = bar.price(self.field);
        let reference = bar.open;
        ensure_positive(self.field.as_str(), raw)?;
        ensure_positive("open", reference)?;

        self.values.push((raw / reference).ln());
        Ok(())
    }

    /// Normalized values.
    pub fn window(&self) -> &RollingWindow {
        &self.values
    }

    /// Normalized price component.
    pub fn field(&self) -> PriceField {
        self.field
    }
}
