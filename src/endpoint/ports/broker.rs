//! Broker capability port consumed by endpoints.
//!
//! The contract is deliberately narrow: destination resolution, consumer and
//! producer creation, listener registration, and resource release. Connection
//! management, persistence, selector evaluation and acknowledgement belong to
//! the adapter.

use crate::endpoint::domain::{ChannelSpec, Message, SendOptions};
use std::sync::Arc;
use thiserror::Error;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Error a listener reports back to the broker transport.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Broker-side handle for a queue or topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    channel: ChannelSpec,
}

impl Destination {
    /// Creates a destination for a resolved channel.
    #[must_use]
    pub const fn new(channel: ChannelSpec) -> Self {
        Self { channel }
    }

    /// Returns the channel this destination refers to.
    #[must_use]
    pub const fn channel(&self) -> &ChannelSpec {
        &self.channel
    }
}

/// Callback invoked by the broker for every delivered message.
///
/// An error return is surfaced to the broker's own error-handling facility.
pub trait MessageListener: Send + Sync {
    /// Handles one delivered message.
    ///
    /// # Errors
    ///
    /// Returns a [`ListenerError`] when the message could not be handled and
    /// the failure must be escalated to the transport.
    fn on_message(&self, message: &Message) -> Result<(), ListenerError>;
}

/// Inbound consumer bound to one destination.
pub trait MessageConsumer: Send + Sync {
    /// Registers the delivery callback.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the consumer is closed or the transport
    /// rejects the registration.
    fn set_listener(&self, listener: Arc<dyn MessageListener>) -> BrokerResult<()>;

    /// Releases the consumer. Durable subscriptions remain registered.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the transport fails to release it.
    fn close(&self) -> BrokerResult<()>;
}

/// Outbound producer bound to one destination.
pub trait MessageProducer: Send + Sync {
    /// Sends a message with explicit delivery parameters.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the producer is closed or the transport
    /// fails.
    fn send(&self, message: &Message, options: SendOptions) -> BrokerResult<()>;

    /// Releases the producer.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the transport fails to release it.
    fn close(&self) -> BrokerResult<()>;
}

/// Session-scoped broker capability owned exclusively by one endpoint.
pub trait BrokerSession: Send + Sync {
    /// Resolves a channel specification to a broker destination.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the session is closed or the channel
    /// cannot be resolved.
    fn resolve_destination(&self, channel: &ChannelSpec) -> BrokerResult<Destination>;

    /// Opens a plain consumer filtered by an optional selector.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] for closed sessions, invalid selectors, or
    /// transport failures.
    fn create_consumer(
        &self,
        destination: &Destination,
        selector: Option<&str>,
    ) -> BrokerResult<Box<dyn MessageConsumer>>;

    /// Opens a durable topic subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] for closed sessions, non-topic destinations,
    /// subscriptions already in use, invalid selectors, or transport
    /// failures.
    fn create_durable_consumer(
        &self,
        destination: &Destination,
        subscription_name: &str,
        selector: Option<&str>,
    ) -> BrokerResult<Box<dyn MessageConsumer>>;

    /// Opens a producer for a destination.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] for closed sessions or transport failures.
    fn create_producer(&self, destination: &Destination) -> BrokerResult<Box<dyn MessageProducer>>;

    /// Removes a durable subscription.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::UnknownSubscription`] when no such
    /// subscription exists and [`BrokerError::SubscriptionInUse`] while a
    /// consumer is attached to it.
    fn unsubscribe(&self, subscription_name: &str) -> BrokerResult<()>;

    /// Closes the session and everything it opened.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the transport fails to release it.
    fn close(&self) -> BrokerResult<()>;
}

/// Errors returned by broker adapters.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// The session, consumer or producer was already closed.
    #[error("{0} is closed")]
    Closed(&'static str),

    /// No durable subscription exists with this name.
    #[error("durable subscription '{0}' does not exist")]
    UnknownSubscription(String),

    /// A consumer is already attached to the durable subscription.
    #[error("durable subscription '{0}' is in use")]
    SubscriptionInUse(String),

    /// A durable subscription was requested on a queue.
    #[error("durable subscriptions require a topic, got {0}")]
    NotATopic(ChannelSpec),

    /// The selector expression could not be parsed.
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector {
        /// Selector text.
        selector: String,
        /// Parse failure description.
        reason: String,
    },

    /// Generic transport failure.
    #[error("broker transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl BrokerError {
    /// Wraps a transport error from the broker adapter.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }

    /// Creates an invalid-selector error.
    #[must_use]
    pub fn invalid_selector(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }
}
