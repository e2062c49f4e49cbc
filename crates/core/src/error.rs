//! Error types for the barfeed system.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the barfeed system.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A symbol was registered twice with the same registry.
    #[error("Symbol {symbol} is already registered in {registry}")]
    DuplicateSymbol { registry: String, symbol: String },

    /// A symbol was used without being registered.
    #[error("Symbol {symbol} is not registered in {registry}")]
    UnknownSymbol { registry: String, symbol: String },

    /// A registry's window length does not match its aggregator.
    #[error("Window length of {expected} does not match {found} for {registry}")]
    WindowMismatch {
        registry: String,
        expected: usize,
        found: usize,
    },

    /// Input outside an indicator's domain (e.g. log of a non-positive price).
    #[error("Domain error: {0}")]
    Domain(String),

    /// Data error (invalid or malformed event).
    #[error("Data error: {0}")]
    Data(String),

    /// Upstream connection or read failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An operation did not finish within its bound.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A run cycle is already active.
    #[error("Already running: {0}")]
    AlreadyRunning(String),

    /// No run cycle is active.
    #[error("Not running: {0}")]
    NotRunning(String),

    /// The bus has no upstream source to run.
    #[error("No event source: {0}")]
    NoSource(String),

    /// A subscriber panicked while handling an event.
    #[error("Subscriber {subscriber} failed: {message}")]
    Subscriber { subscriber: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a domain error.
    pub fn domain(msg: impl Into<String>) -> Self {
        Error::Domain(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a duplicate registration error.
    pub fn duplicate_symbol(registry: impl Into<String>, symbol: impl Into<String>) -> Self {
        Error::DuplicateSymbol {
            registry: registry.into(),
            symbol: symbol.into(),
        }
    }

    /// Create an unknown symbol error.
    pub fn unknown_symbol(registry: impl Into<String>, symbol: impl Into<String>) -> Self {
        Error::UnknownSymbol {
            registry: registry.into(),
            symbol: symbol.into(),
        }
    }

    /// Programmer and configuration errors: never retried, abort the
    /// offending call.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::DuplicateSymbol { .. }
                | Error::UnknownSymbol { .. }
                | Error::WindowMismatch { .. }
                | Error::AlreadyRunning(_)
                | Error::NotRunning(_)
                | Error::NoSource(_)
                | Error::Json(_)
        )
    }

    /// Per-event rejections, including subscriber panics. Prior state is
    /// left intact and the stream continues.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Error::Domain(_) | Error::Data(_) | Error::Subscriber { .. }
        )
    }

    /// Connection-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout(_) | Error::Io(_))
    }
}
