//! In-memory broker adapter.
//!
//! A deterministic, synchronous broker: sends are delivered inline on the
//! sending thread. Used by integration tests and for embedding endpoints
//! without an external broker.

mod broker;
mod collector;
mod selector;

pub use broker::{BrokerOperation, InMemoryBroker, InMemorySession, OpenResources};
pub use collector::MessageCollector;
pub use selector::Selector;
