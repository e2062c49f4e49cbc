//! Event ingestion and distribution for the barfeed system.
//!
//! This crate handles:
//! - Upstream event sources (in-process channels, JSON lines)
//! - The publish/subscribe event bus
//! - Background listener threads with bounded shutdown

pub mod bus;
mod listener;
pub mod source;

pub use bus::{BusStats, DispatchReport, EventBus, Subscriber, SubscriberFailure};
pub use source::{ChannelSource, EventSource, JsonLinesSource, SourcePoll};
