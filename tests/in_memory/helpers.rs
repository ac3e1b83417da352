//! Shared test helpers for in-memory broker integration tests.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Local, TimeDelta, Utc};
use message_link::endpoint::{
    adapters::{RecordingObserver, memory::InMemoryBroker},
    domain::{ChannelSpec, Message, VerificationError},
    ports::MessageVerifier,
    services::RoutingEndpoint,
};
use mockable::Clock;
use rstest::fixture;

/// Integer property used by verifiers and selectors in these tests.
pub const HEADER_KEY: &str = "HEADER_KEY";

/// Provides a fresh broker for each test.
#[fixture]
pub fn broker() -> InMemoryBroker {
    InMemoryBroker::new()
}

/// Provides a recording observer for each test.
#[fixture]
pub fn observer() -> RecordingObserver {
    RecordingObserver::new()
}

/// Publishes `count` text messages with `HEADER_KEY` values `0..count`.
///
/// # Panics
///
/// Panics if the broker rejects a message.
pub fn produce(broker: &InMemoryBroker, channel: &ChannelSpec, count: i64) -> Vec<Message> {
    (0..count)
        .map(|index| {
            let message = Message::text(format!("Message {index}")).with_property(HEADER_KEY, index);
            broker
                .publish(channel, &message)
                .expect("publish should succeed");
            message
        })
        .collect()
}

/// Accepts messages whose `HEADER_KEY` is at most `limit`.
#[must_use]
pub fn header_limit_verifier(limit: i64) -> Arc<dyn MessageVerifier> {
    Arc::new(move |message: &Message| match message.int_property(HEADER_KEY) {
        Some(value) if value <= limit => Ok(()),
        Some(value) => Err(VerificationError::for_message(
            message,
            format!("{HEADER_KEY} {value} exceeds limit {limit}"),
        )),
        None => Err(VerificationError::for_message(message, "missing HEADER_KEY")),
    })
}

/// Builds a named routing endpoint between two channels.
///
/// # Panics
///
/// Panics if the endpoint rejects configuration.
#[must_use]
pub fn routing_endpoint(
    observer: &RecordingObserver,
    name: &str,
    source: ChannelSpec,
    destination: ChannelSpec,
) -> RoutingEndpoint {
    let mut endpoint = RoutingEndpoint::with_observer(Arc::new(observer.clone()));
    endpoint
        .set_name(name)
        .and_then(|link| link.set_source(source))
        .and_then(|link| link.set_destination(destination))
        .expect("endpoint should be editable");
    endpoint
}

/// Monotonic counter for recording the order of pipeline stages.
#[derive(Debug, Default)]
pub struct Ticks(AtomicU64);

impl Ticks {
    /// Returns the next tick, starting at 1.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct SteppingClock(Mutex<DateTime<Utc>>);

impl SteppingClock {
    /// Creates a clock frozen at the current time.
    #[must_use]
    pub fn new() -> Self {
        Self(Mutex::new(Utc::now()))
    }

    /// Moves the clock forward.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Default for SteppingClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SteppingClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
