//! Core event types for the barfeed system.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Convert a millisecond timestamp to a UTC datetime, if representable.
#[inline]
pub fn ts_to_datetime(ts_ms: TimestampMs) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ts_ms).single()
}

/// Anything the event bus can route.
pub trait MarketEvent: Send + Sync + 'static {
    /// Symbol the event belongs to.
    fn symbol(&self) -> &str;

    /// Event timestamp.
    fn ts_ms(&self) -> TimestampMs;

    /// Reject malformed events before they reach subscribers.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Price component of a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
}

impl PriceField {
    /// Lowercase name, used for column labels.
    pub fn as_str(self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
        }
    }
}

/// One completed OHLCV interval for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Traded symbol (e.g., "AAPL").
    pub symbol: String,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Total volume.
    pub volume: f64,
    /// Interval timestamp (ms).
    pub ts_ms: TimestampMs,
}

impl Bar {
    /// Select one price component.
    #[inline]
    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
        }
    }

    /// Typical price: (high + low + close) / 3.
    #[inline]
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Timestamp as a UTC datetime.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        ts_to_datetime(self.ts_ms)
    }
}

impl MarketEvent for Bar {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn ts_ms(&self) -> TimestampMs {
        self.ts_ms
    }
}

/// Side of a filled order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i8)]
pub enum Side {
    Buy = 1,
    Sell = -1,
}

impl Side {
    /// Get the sign as i8.
    #[inline]
    pub fn sign(self) -> i8 {
        self as i8
    }

    /// Get the sign as f64.
    #[inline]
    pub fn sign_f64(self) -> f64 {
        self.sign() as f64
    }
}

/// One filled order, as reported by the brokerage stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Fill side.
    pub side: Side,
    /// Traded symbol.
    pub symbol: String,
    /// Filled quantity (positive).
    pub qty: f64,
    /// Fill price (positive).
    pub price: f64,
    /// Fill timestamp (ms).
    pub ts_ms: TimestampMs,
}

impl Trade {
    /// Quantity times price.
    #[inline]
    pub fn notional(&self) -> f64 {
        self.qty * self.price
    }

    /// Positive for buys, negative for sells.
    #[inline]
    pub fn signed_qty(&self) -> f64 {
        self.qty * self.side.sign_f64()
    }

    /// Timestamp as a UTC datetime.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        ts_to_datetime(self.ts_ms)
    }
}

impl MarketEvent for Trade {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn ts_ms(&self) -> TimestampMs {
        self.ts_ms
    }

    fn validate(&self) -> Result<()> {
        if !(self.qty.is_finite() && self.qty > 0.0) {
            return Err(Error::data(format!(
                "trade for {} has non-positive qty {}",
                self.symbol, self.qty
            )));
        }
        if !(self.price.is_finite() && self.price > 0.0) {
            return Err(Error::data(format!(
                "trade for {} has non-positive price {}",
                self.symbol, self.price
            )));
        }
        Ok(())
    }
}
