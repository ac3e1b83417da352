//! Port contracts for endpoint collaborators.
//!
//! The broker session, message verifiers and transformers, pass-through
//! handlers, and the diagnostic observer are all consumed through these
//! traits; adapters supply the implementations.

mod broker;
mod handler;
mod observer;
mod transformer;
mod verifier;

pub use broker::{
    BrokerError, BrokerResult, BrokerSession, Destination, ListenerError, MessageConsumer,
    MessageListener, MessageProducer,
};
pub use handler::MessageHandler;
pub use observer::{EndpointEvent, EndpointObserver, EventLevel};
pub use transformer::MessageTransformer;
pub use verifier::MessageVerifier;
