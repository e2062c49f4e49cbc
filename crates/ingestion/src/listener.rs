//! Background listener thread for an event bus.
//!
//! The listener owns the source for the duration of a run cycle, polls it
//! with a bounded timeout and dispatches each event synchronously before
//! reading the next one. Cancellation is checked between reads.

use barfeed_core::{Error, MarketEvent, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::bus::EventBus;
use crate::source::{EventSource, SourcePoll};

/// Subscription changes forwarded to a running source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Subscribe(String),
    Unsubscribe(String),
}

/// Handle to a running listener thread.
pub(crate) struct Listener<E> {
    cancel: Arc<AtomicBool>,
    commands: Sender<Command>,
    done: Receiver<()>,
    handle: JoinHandle<Box<dyn EventSource<E>>>,
}

impl<E: MarketEvent> Listener<E> {
    /// Spawn the listener thread.
    ///
    /// The thread holds only a weak reference to the bus, so dropping the
    /// last handle to the bus ends the run cycle.
    pub(crate) fn spawn(
        bus: Weak<EventBus<E>>,
        name: &str,
        mut source: Box<dyn EventSource<E>>,
        symbols: BTreeSet<String>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let cancel = Arc::new(AtomicBool::new(false));
        let (commands, command_rx) = crossbeam_channel::unbounded();
        let (done_tx, done) = crossbeam_channel::bounded(1);

        let thread_cancel = Arc::clone(&cancel);
        let bus_name = name.to_string();
        let handle = std::thread::Builder::new()
            .name(format!("{name}-listener"))
            .spawn(move || {
                run_loop(
                    &bus,
                    &bus_name,
                    source.as_mut(),
                    &symbols,
                    &thread_cancel,
                    &command_rx,
                    poll_interval,
                );
                let _ = done_tx.send(());
                source
            })?;

        Ok(Self {
            cancel,
            commands,
            done,
            handle,
        })
    }

    /// Forward a subscription change. Dropped if the thread already ended.
    pub(crate) fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Listener already ended, dropping subscription change");
        }
    }

    /// Signal cancellation without waiting.
    pub(crate) fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Whether the thread has exited.
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel and wait up to `timeout` for the thread to exit.
    ///
    /// On success the source is handed back. On timeout the thread is
    /// abandoned; the cancel flag keeps it from dispatching again.
    pub(crate) fn shutdown(self, timeout: Duration) -> Result<Box<dyn EventSource<E>>> {
        self.cancel();
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => self
                .handle
                .join()
                .map_err(|_| Error::transport("listener thread panicked")),
            Err(RecvTimeoutError::Timeout) => Err(Error::timeout(format!(
                "listener did not stop within {} ms",
                timeout.as_millis()
            ))),
        }
    }
}

fn apply_command<E>(source: &mut dyn EventSource<E>, command: Command, bus: &str) {
    let result = match &command {
        Command::Subscribe(symbol) => source.subscribe(symbol),
        Command::Unsubscribe(symbol) => source.unsubscribe(symbol),
    };
    if let Err(e) = result {
        warn!(bus = %bus, command = ?command, error = %e, "Source rejected subscription change");
    }
}

fn run_loop<E: MarketEvent>(
    bus: &Weak<EventBus<E>>,
    name: &str,
    source: &mut dyn EventSource<E>,
    symbols: &BTreeSet<String>,
    cancel: &AtomicBool,
    commands: &Receiver<Command>,
    poll_interval: Duration,
) {
    if let Err(e) = source.connect(symbols) {
        error!(bus = %name, error = %e, "Failed to connect event source");
        return;
    }
    info!(bus = %name, symbols = symbols.len(), "Listener connected");

    while !cancel.load(Ordering::Acquire) {
        for command in commands.try_iter() {
            apply_command(source, command, name);
        }

        match source.poll(poll_interval) {
            Ok(SourcePoll::Event(event)) => {
                if cancel.load(Ordering::Acquire) {
                    debug!(bus = %name, "Stop requested during poll, dropping event");
                    break;
                }
                let Some(live) = bus.upgrade() else {
                    debug!(bus = %name, "Bus dropped, ending listener");
                    break;
                };
                live.dispatch(&event);
            }
            Ok(SourcePoll::Idle) => {}
            Ok(SourcePoll::Closed) => {
                info!(bus = %name, "Upstream closed the stream");
                break;
            }
            Err(e) => {
                error!(bus = %name, error = %e, "Event source failed, listener exiting");
                break;
            }
        }
    }

    source.disconnect();
    info!(bus = %name, "Listener disconnected");
}
