//! Publish/subscribe hub for market events.
//!
//! Each bus fans one upstream stream out to an ordered list of subscribers.
//! Delivery is synchronous: `dispatch` runs every subscriber to completion on
//! the calling thread before returning, which gives the listener natural
//! backpressure.

use barfeed_core::{BusConfig, Error, MarketEvent, Result};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::listener::{Command, Listener};
use crate::source::EventSource;

/// A consumer of events from a bus.
pub trait Subscriber<E>: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Handle one event.
    fn on_event(&self, event: &E) -> Result<()>;
}

/// A subscriber that failed to handle an event.
#[derive(Debug)]
pub struct SubscriberFailure {
    /// Subscriber name.
    pub subscriber: String,
    /// The error it returned, or `Error::Subscriber` for a panic.
    pub error: Error,
}

/// Outcome of dispatching one event.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Subscribers that handled the event.
    pub delivered: usize,
    /// Subscribers that failed, in delivery order.
    pub failures: Vec<SubscriberFailure>,
    /// Set when the event failed validation and was not delivered.
    pub rejected: Option<Error>,
}

impl DispatchReport {
    /// True if the event reached every subscriber without error.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.rejected.is_none()
    }
}

/// Counters since the bus was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Events passed to `dispatch`.
    pub dispatched: u64,
    /// Successful subscriber deliveries.
    pub delivered: u64,
    /// Failed subscriber deliveries.
    pub failures: u64,
    /// Events dropped by validation.
    pub skipped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    delivered: AtomicU64,
    failures: AtomicU64,
    skipped: AtomicU64,
}

type SubscriberList<E> = Arc<Vec<Arc<dyn Subscriber<E>>>>;

/// Event bus for one upstream stream.
///
/// Buses are shared through `Arc`; `run` needs an `Arc<Self>` so that the
/// listener thread can reach the bus.
pub struct EventBus<E: MarketEvent> {
    name: String,
    config: BusConfig,
    /// Copy-on-write: dispatch clones the `Arc`, mutation swaps it.
    subscribers: RwLock<SubscriberList<E>>,
    /// Symbols the upstream should stream.
    symbols: Mutex<BTreeSet<String>>,
    /// Source while idle; moves into the listener while running.
    source: Mutex<Option<Box<dyn EventSource<E>>>>,
    /// Active run cycle. Lock order: `listener` before `symbols`.
    listener: Mutex<Option<Listener<E>>>,
    counters: Counters,
}

impl<E: MarketEvent> EventBus<E> {
    /// Create a bus reading from `source`.
    pub fn new(
        name: impl Into<String>,
        source: Box<dyn EventSource<E>>,
        config: BusConfig,
    ) -> Arc<Self> {
        Arc::new(Self::build(name.into(), Some(source), config))
    }

    /// Create a bus with no upstream; events arrive only through `dispatch`.
    pub fn detached(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::build(name.into(), None, BusConfig::default()))
    }

    fn build(name: String, source: Option<Box<dyn EventSource<E>>>, config: BusConfig) -> Self {
        Self {
            name,
            config,
            subscribers: RwLock::new(Arc::new(Vec::new())),
            symbols: Mutex::new(BTreeSet::new()),
            source: Mutex::new(source),
            listener: Mutex::new(None),
            counters: Counters::default(),
        }
    }

    /// Bus name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a subscriber. Duplicates are allowed.
    pub fn add_subscriber(&self, subscriber: Arc<dyn Subscriber<E>>) {
        let mut guard = self.subscribers.write();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        debug!(bus = %self.name, subscriber = %subscriber.name(), "Adding subscriber");
        next.push(subscriber);
        *guard = Arc::new(next);
    }

    /// Number of subscribers, counting duplicates.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Ask the upstream to stream `symbol`.
    ///
    /// Returns `false` if it was already subscribed.
    pub fn subscribe(&self, symbol: &str) -> bool {
        let listener = self.listener.lock();
        if !self.symbols.lock().insert(symbol.to_string()) {
            return false;
        }
        if let Some(listener) = listener.as_ref() {
            listener.send(Command::Subscribe(symbol.to_string()));
        }
        info!(bus = %self.name, symbol = %symbol, "Subscribed to symbol");
        true
    }

    /// Ask the upstream to stop streaming `symbol`.
    ///
    /// Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, symbol: &str) -> bool {
        let listener = self.listener.lock();
        if !self.symbols.lock().remove(symbol) {
            return false;
        }
        if let Some(listener) = listener.as_ref() {
            listener.send(Command::Unsubscribe(symbol.to_string()));
        }
        info!(bus = %self.name, symbol = %symbol, "Unsubscribed from symbol");
        true
    }

    /// Currently subscribed symbols, sorted.
    pub fn active_symbols(&self) -> Vec<String> {
        self.symbols.lock().iter().cloned().collect()
    }

    /// Deliver one event to every subscriber, in registration order.
    ///
    /// A failing or panicking subscriber is logged and reported; the
    /// remaining subscribers still receive the event.
    pub fn dispatch(&self, event: &E) -> DispatchReport {
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = event.validate() {
            warn!(bus = %self.name, symbol = %event.symbol(), error = %e, "Dropping invalid event");
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            return DispatchReport {
                rejected: Some(e),
                ..DispatchReport::default()
            };
        }

        let subscribers = Arc::clone(&*self.subscribers.read());
        debug!(
            bus = %self.name,
            symbol = %event.symbol(),
            ts_ms = event.ts_ms(),
            subscribers = subscribers.len(),
            "Dispatching event"
        );

        let mut report = DispatchReport::default();
        for subscriber in subscribers.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event)));
            let error = match outcome {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(
                        bus = %self.name,
                        subscriber = %subscriber.name(),
                        symbol = %event.symbol(),
                        error = %e,
                        "Subscriber rejected event"
                    );
                    e
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(
                        bus = %self.name,
                        subscriber = %subscriber.name(),
                        symbol = %event.symbol(),
                        panic = %message,
                        "Subscriber panicked"
                    );
                    Error::Subscriber {
                        subscriber: subscriber.name().to_string(),
                        message,
                    }
                }
            };
            report.failures.push(SubscriberFailure {
                subscriber: subscriber.name().to_string(),
                error,
            });
        }

        self.counters
            .delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.counters
            .failures
            .fetch_add(report.failures.len() as u64, Ordering::Relaxed);
        report
    }

    /// Start the background listener.
    ///
    /// Connects the source with the active symbols and dispatches every
    /// event it yields until `stop`.
    pub fn run(self: &Arc<Self>) -> Result<()> {
        let mut listener = self.listener.lock();
        if let Some(active) = listener.take() {
            if !active.is_finished() {
                *listener = Some(active);
                return Err(Error::AlreadyRunning(self.name.clone()));
            }
            // Previous cycle ended on its own; reclaim its source.
            self.reclaim(active)?;
        }

        let source = self
            .source
            .lock()
            .take()
            .ok_or_else(|| Error::NoSource(self.name.clone()))?;
        let symbols = self.symbols.lock().clone();

        let spawned = Listener::spawn(
            Arc::downgrade(self),
            &self.name,
            source,
            symbols,
            self.config.poll_interval(),
        )?;
        *listener = Some(spawned);
        info!(bus = %self.name, "Bus running");
        Ok(())
    }

    /// Stop the listener, waiting at most the configured stop timeout.
    pub fn stop(&self) -> Result<()> {
        let mut listener = self.listener.lock();
        let active = listener
            .take()
            .ok_or_else(|| Error::NotRunning(self.name.clone()))?;
        match self.reclaim(active) {
            Ok(()) => {
                info!(bus = %self.name, "Bus stopped");
                Ok(())
            }
            Err(e) => {
                error!(bus = %self.name, error = %e, "Listener abandoned");
                Err(e)
            }
        }
    }

    fn reclaim(&self, active: Listener<E>) -> Result<()> {
        let source = active.shutdown(self.config.stop_timeout())?;
        *self.source.lock() = Some(source);
        Ok(())
    }

    /// Whether a listener thread is alive.
    pub fn is_running(&self) -> bool {
        self.listener
            .lock()
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
    }

    /// Delivery counters.
    pub fn stats(&self) -> BusStats {
        BusStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }
}

impl<E: MarketEvent> Drop for EventBus<E> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().as_ref() {
            listener.cancel();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ChannelSource, SourcePoll};
    use barfeed_core::{Bar, Side, Trade};
    use std::time::{Duration, Instant};

    fn make_bar(symbol: &str, close: f64) -> Bar {
        Bar {
            symbol: symbol.to_string(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
            ts_ms: 1_704_067_200_000,
        }
    }

    fn fast_config() -> BusConfig {
        BusConfig {
            poll_interval_ms: 5,
            stop_timeout_ms: 1_000,
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    /// Records (subscriber id, close) into a shared log.
    struct Recorder {
        id: usize,
        name: String,
        log: Arc<Mutex<Vec<(usize, f64)>>>,
    }

    impl Recorder {
        fn new(id: usize, log: &Arc<Mutex<Vec<(usize, f64)>>>) -> Arc<Self> {
            Arc::new(Self {
                id,
                name: format!("recorder-{id}"),
                log: Arc::clone(log),
            })
        }
    }

    impl Subscriber<Bar> for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn on_event(&self, event: &Bar) -> Result<()> {
            self.log.lock().push((self.id, event.close));
            Ok(())
        }
    }

    struct Failing;

    impl Subscriber<Bar> for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn on_event(&self, event: &Bar) -> Result<()> {
            Err(Error::domain(format!("cannot handle {}", event.symbol)))
        }
    }

    struct Panicking;

    impl Subscriber<Bar> for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn on_event(&self, _event: &Bar) -> Result<()> {
            panic!("boom");
        }
    }

    struct TradeCounter {
        count: AtomicU64,
    }

    impl Subscriber<Trade> for TradeCounter {
        fn name(&self) -> &str {
            "trade-counter"
        }

        fn on_event(&self, _event: &Trade) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let bus = EventBus::<Bar>::detached("bars");
        let log = Arc::new(Mutex::new(Vec::new()));
        for id in 0..3 {
            bus.add_subscriber(Recorder::new(id, &log));
        }

        let report = bus.dispatch(&make_bar("AAPL", 130.0));

        assert!(report.is_clean());
        assert_eq!(report.delivered, 3);
        assert_eq!(*log.lock(), vec![(0, 130.0), (1, 130.0), (2, 130.0)]);
    }

    #[test]
    fn test_duplicate_subscribers_receive_twice() {
        let bus = EventBus::<Bar>::detached("bars");
        let log = Arc::new(Mutex::new(Vec::new()));
        let recorder = Recorder::new(7, &log);
        bus.add_subscriber(recorder.clone());
        bus.add_subscriber(recorder);

        assert_eq!(bus.subscriber_count(), 2);
        bus.dispatch(&make_bar("AAPL", 1.0));
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_failures_do_not_block_delivery() {
        let bus = EventBus::<Bar>::detached("bars");
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.add_subscriber(Arc::new(Failing));
        bus.add_subscriber(Recorder::new(1, &log));
        bus.add_subscriber(Arc::new(Panicking));
        bus.add_subscriber(Recorder::new(2, &log));

        let report = bus.dispatch(&make_bar("AAPL", 5.0));

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].subscriber, "failing");
        assert!(report.failures[0].error.is_domain());
        assert!(matches!(
            &report.failures[1].error,
            Error::Subscriber { message, .. } if message == "boom"
        ));
        assert_eq!(*log.lock(), vec![(1, 5.0), (2, 5.0)]);

        let stats = bus.stats();
        assert_eq!(stats.dispatched, 1);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.failures, 2);
    }

    #[test]
    fn test_invalid_trade_is_skipped() {
        let bus = EventBus::<Trade>::detached("trades");
        let counter = Arc::new(TradeCounter {
            count: AtomicU64::new(0),
        });
        bus.add_subscriber(counter.clone());

        let mut trade = Trade {
            side: Side::Buy,
            symbol: "AAPL".to_string(),
            qty: 40.0,
            price: 130.0,
            ts_ms: 0,
        };
        assert!(bus.dispatch(&trade).is_clean());

        trade.qty = 0.0;
        let report = bus.dispatch(&trade);
        assert!(report.rejected.is_some());
        assert_eq!(counter.count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.stats().skipped, 1);
    }

    #[test]
    fn test_subscriber_added_during_dispatch() {
        struct Adder {
            bus: Arc<EventBus<Bar>>,
            log: Arc<Mutex<Vec<(usize, f64)>>>,
        }

        impl Subscriber<Bar> for Adder {
            fn name(&self) -> &str {
                "adder"
            }

            fn on_event(&self, _event: &Bar) -> Result<()> {
                self.bus.add_subscriber(Recorder::new(9, &self.log));
                Ok(())
            }
        }

        let bus = EventBus::<Bar>::detached("bars");
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.add_subscriber(Arc::new(Adder {
            bus: Arc::clone(&bus),
            log: Arc::clone(&log),
        }));

        // The snapshot taken for this dispatch does not include the new subscriber.
        let report = bus.dispatch(&make_bar("AAPL", 1.0));
        assert_eq!(report.delivered, 1);
        assert!(log.lock().is_empty());
        assert_eq!(bus.subscriber_count(), 2);

        bus.dispatch(&make_bar("AAPL", 2.0));
        assert_eq!(*log.lock(), vec![(9, 2.0)]);
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let bus = EventBus::<Bar>::detached("bars");
        assert!(bus.subscribe("AAPL"));
        assert!(!bus.subscribe("AAPL"));
        assert!(bus.subscribe("TSLA"));
        assert_eq!(bus.active_symbols(), vec!["AAPL", "TSLA"]);

        assert!(bus.unsubscribe("AAPL"));
        assert!(!bus.unsubscribe("AAPL"));
        assert_eq!(bus.active_symbols(), vec!["TSLA"]);
    }

    #[test]
    fn test_lifecycle_errors() {
        let detached = EventBus::<Bar>::detached("bars");
        assert!(matches!(detached.run(), Err(Error::NoSource(_))));
        assert!(matches!(detached.stop(), Err(Error::NotRunning(_))));

        let (_tx, source) = ChannelSource::<Bar>::pair();
        let bus = EventBus::<Bar>::new("bars", Box::new(source), fast_config());
        bus.run().unwrap();
        assert!(matches!(bus.run(), Err(Error::AlreadyRunning(_))));
        bus.stop().unwrap();
        assert!(!bus.is_running());
    }

    #[test]
    fn test_run_dispatches_until_stop() {
        let (tx, source) = ChannelSource::pair();
        let bus = EventBus::<Bar>::new("bars", Box::new(source), fast_config());
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.add_subscriber(Recorder::new(0, &log));

        bus.run().unwrap();
        assert!(bus.is_running());
        for close in [1.0, 2.0, 3.0] {
            tx.send(make_bar("AAPL", close)).unwrap();
        }
        assert!(wait_until(|| log.lock().len() == 3));
        bus.stop().unwrap();

        // Source is reclaimed and the bus can run again.
        bus.run().unwrap();
        tx.send(make_bar("AAPL", 4.0)).unwrap();
        assert!(wait_until(|| log.lock().len() == 4));
        bus.stop().unwrap();

        let closes: Vec<f64> = log.lock().iter().map(|(_, c)| *c).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_subscription_changes_reach_running_source() {
        let (tx, source) = ChannelSource::pair();
        let bus = EventBus::<Bar>::new("bars", Box::new(source.subscribed_only()), fast_config());
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.add_subscriber(Recorder::new(0, &log));
        bus.subscribe("AAPL");

        bus.run().unwrap();
        tx.send(make_bar("TSLA", 1.0)).unwrap();
        tx.send(make_bar("AAPL", 2.0)).unwrap();
        assert!(wait_until(|| log.lock().len() == 1));

        bus.subscribe("TSLA");
        // Give the listener a poll cycle to apply the change.
        std::thread::sleep(Duration::from_millis(50));
        tx.send(make_bar("TSLA", 3.0)).unwrap();
        assert!(wait_until(|| log.lock().len() == 2));
        bus.stop().unwrap();

        let closes: Vec<f64> = log.lock().iter().map(|(_, c)| *c).collect();
        assert_eq!(closes, vec![2.0, 3.0]);
    }

    #[test]
    fn test_listener_ends_when_upstream_closes() {
        let (tx, source) = ChannelSource::<Bar>::pair();
        let bus = EventBus::<Bar>::new("bars", Box::new(source), fast_config());
        bus.run().unwrap();
        drop(tx);

        assert!(wait_until(|| !bus.is_running()));
        // Stopping an ended cycle still reclaims the source.
        bus.stop().unwrap();
        assert!(matches!(bus.stop(), Err(Error::NotRunning(_))));
    }

    /// Source whose poll ignores its timeout.
    struct Stuck;

    impl EventSource<Bar> for Stuck {
        fn connect(&mut self, _symbols: &BTreeSet<String>) -> Result<()> {
            Ok(())
        }

        fn subscribe(&mut self, _symbol: &str) -> Result<()> {
            Ok(())
        }

        fn unsubscribe(&mut self, _symbol: &str) -> Result<()> {
            Ok(())
        }

        fn poll(&mut self, _timeout: Duration) -> Result<SourcePoll<Bar>> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(SourcePoll::Idle)
        }

        fn disconnect(&mut self) {}
    }

    #[test]
    fn test_stop_times_out_on_stuck_source() {
        let config = BusConfig {
            poll_interval_ms: 5,
            stop_timeout_ms: 20,
        };
        let bus = EventBus::<Bar>::new("bars", Box::new(Stuck), config);
        bus.run().unwrap();
        std::thread::sleep(Duration::from_millis(10));

        let started = Instant::now();
        assert!(matches!(bus.stop(), Err(Error::Timeout(_))));
        assert!(started.elapsed() < Duration::from_millis(400));

        // The abandoned listener kept the source.
        assert!(!bus.is_running());
        assert!(matches!(bus.run(), Err(Error::NoSource(_))));
    }

    /// Blocks past the stop timeout, then yields a bar.
    struct LateEvent;

    impl EventSource<Bar> for LateEvent {
        fn connect(&mut self, _symbols: &BTreeSet<String>) -> Result<()> {
            Ok(())
        }

        fn subscribe(&mut self, _symbol: &str) -> Result<()> {
            Ok(())
        }

        fn unsubscribe(&mut self, _symbol: &str) -> Result<()> {
            Ok(())
        }

        fn poll(&mut self, _timeout: Duration) -> Result<SourcePoll<Bar>> {
            std::thread::sleep(Duration::from_millis(150));
            Ok(SourcePoll::Event(make_bar("AAPL", 1.0)))
        }

        fn disconnect(&mut self) {}
    }

    #[test]
    fn test_abandoned_listener_never_dispatches() {
        let config = BusConfig {
            poll_interval_ms: 5,
            stop_timeout_ms: 20,
        };
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = EventBus::<Bar>::new("bars", Box::new(LateEvent), config);
        bus.add_subscriber(Recorder::new(0, &log));
        bus.run().unwrap();
        std::thread::sleep(Duration::from_millis(10));

        assert!(matches!(bus.stop(), Err(Error::Timeout(_))));

        // Outlast the pending poll and at least one more.
        std::thread::sleep(Duration::from_millis(350));
        assert!(log.lock().is_empty());
        assert_eq!(bus.stats().dispatched, 0);
        assert_eq!(bus.stats().delivered, 0);
    }

    struct Broken;

    impl EventSource<Bar> for Broken {
        fn connect(&mut self, _symbols: &BTreeSet<String>) -> Result<()> {
            Ok(())
        }

        fn subscribe(&mut self, _symbol: &str) -> Result<()> {
            Ok(())
        }

        fn unsubscribe(&mut self, _symbol: &str) -> Result<()> {
            Ok(())
        }

        fn poll(&mut self, _timeout: Duration) -> Result<SourcePoll<Bar>> {
            Err(Error::transport("connection reset"))
        }

        fn disconnect(&mut self) {}
    }

    #[test]
    fn test_transport_error_ends_listener() {
        let bus = EventBus::<Bar>::new("bars", Box::new(Broken), fast_config());
        bus.run().unwrap();
        assert!(wait_until(|| !bus.is_running()));
        assert!(bus.stop().is_ok());
        // Supervisors may restart it.
        bus.run().unwrap();
        bus.stop().unwrap();
    }
}
