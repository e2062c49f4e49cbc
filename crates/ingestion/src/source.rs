//! Upstream event sources.
//!
//! A source is the live connection a bus listener reads from. The listener
//! owns it exclusively while running and polls it with a timeout so that
//! cancellation is checked between reads.

use barfeed_core::{Error, MarketEvent, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::io::BufRead;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of one poll.
#[derive(Debug)]
pub enum SourcePoll<E> {
    /// An event arrived.
    Event(E),
    /// Nothing arrived within the timeout.
    Idle,
    /// The upstream ended the stream.
    Closed,
}

/// A live upstream of events.
pub trait EventSource<E>: Send {
    /// Open the connection, streaming the given symbols.
    fn connect(&mut self, symbols: &BTreeSet<String>) -> Result<()>;

    /// Start streaming a symbol.
    fn subscribe(&mut self, symbol: &str) -> Result<()>;

    /// Stop streaming a symbol.
    fn unsubscribe(&mut self, symbol: &str) -> Result<()>;

    /// Wait up to `timeout` for the next event.
    fn poll(&mut self, timeout: Duration) -> Result<SourcePoll<E>>;

    /// Close the connection.
    fn disconnect(&mut self);
}

/// Symbol filter shared by the bundled sources.
#[derive(Debug, Default)]
struct SymbolFilter {
    enabled: bool,
    symbols: BTreeSet<String>,
}

impl SymbolFilter {
    fn accepts(&self, symbol: &str) -> bool {
        !self.enabled || self.symbols.contains(symbol)
    }
}

/// Source fed through an in-process channel.
///
/// Network adapters push decoded events into the sender; tests and replays
/// push them directly.
pub struct ChannelSource<E> {
    rx: Receiver<E>,
    filter: SymbolFilter,
    connected: bool,
}

impl<E: MarketEvent> ChannelSource<E> {
    /// Create a source reading from `rx`.
    pub fn new(rx: Receiver<E>) -> Self {
        Self {
            rx,
            filter: SymbolFilter::default(),
            connected: false,
        }
    }

    /// Create a sender and the source it feeds.
    pub fn pair() -> (Sender<E>, Self) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (tx, Self::new(rx))
    }

    /// Only deliver events for subscribed symbols.
    pub fn subscribed_only(mut self) -> Self {
        self.filter.enabled = true;
        self
    }
}

impl<E: MarketEvent> EventSource<E> for ChannelSource<E> {
    fn connect(&mut self, symbols: &BTreeSet<String>) -> Result<()> {
        self.filter.symbols = symbols.clone();
        self.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, symbol: &str) -> Result<()> {
        self.filter.symbols.insert(symbol.to_string());
        Ok(())
    }

    fn unsubscribe(&mut self, symbol: &str) -> Result<()> {
        self.filter.symbols.remove(symbol);
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<SourcePoll<E>> {
        if !self.connected {
            return Err(Error::transport("channel source is not connected"));
        }
        match self.rx.recv_timeout(timeout) {
            Ok(event) if self.filter.accepts(event.symbol()) => Ok(SourcePoll::Event(event)),
            Ok(event) => {
                debug!(symbol = %event.symbol(), "Dropping event for unsubscribed symbol");
                Ok(SourcePoll::Idle)
            }
            Err(RecvTimeoutError::Timeout) => Ok(SourcePoll::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(SourcePoll::Closed),
        }
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// Source decoding one JSON event per line.
///
/// Reads block on the underlying reader; for sockets, set a read timeout on
/// the stream so the listener can observe cancellation.
pub struct JsonLinesSource<R, E> {
    reader: R,
    line: String,
    filter: SymbolFilter,
    malformed: u64,
    _event: PhantomData<fn() -> E>,
}

impl<R, E> JsonLinesSource<R, E>
where
    R: BufRead + Send,
    E: MarketEvent + DeserializeOwned,
{
    /// Create a source over `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            filter: SymbolFilter::default(),
            malformed: 0,
            _event: PhantomData,
        }
    }

    /// Only deliver events for subscribed symbols.
    pub fn subscribed_only(mut self) -> Self {
        self.filter.enabled = true;
        self
    }

    /// Number of lines that failed to decode.
    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }
}

impl<R, E> EventSource<E> for JsonLinesSource<R, E>
where
    R: BufRead + Send,
    E: MarketEvent + DeserializeOwned,
{
    fn connect(&mut self, symbols: &BTreeSet<String>) -> Result<()> {
        self.filter.symbols = symbols.clone();
        Ok(())
    }

    fn subscribe(&mut self, symbol: &str) -> Result<()> {
        self.filter.symbols.insert(symbol.to_string());
        Ok(())
    }

    fn unsubscribe(&mut self, symbol: &str) -> Result<()> {
        self.filter.symbols.remove(symbol);
        Ok(())
    }

    fn poll(&mut self, _timeout: Duration) -> Result<SourcePoll<E>> {
        self.line.clear();
        let read = match self.reader.read_line(&mut self.line) {
            Ok(read) => read,
            Err(e) if matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ) => return Ok(SourcePoll::Idle),
            Err(e) => return Err(Error::transport(format!("read failed: {e}"))),
        };
        if read == 0 {
            return Ok(SourcePoll::Closed);
        }

        let line = self.line.trim();
        if line.is_empty() {
            return Ok(SourcePoll::Idle);
        }

        match serde_json::from_str::<E>(line) {
            Ok(event) if self.filter.accepts(event.symbol()) => Ok(SourcePoll::Event(event)),
            Ok(_) => Ok(SourcePoll::Idle),
            Err(e) => {
                self.malformed += 1;
                warn!(error = %e, "Skipping malformed event line");
                Ok(SourcePoll::Idle)
            }
        }
    }

    fn disconnect(&mut self) {}
}
