//! Dead-letter routing for messages that failed processing.

use super::{EndpointError, EndpointResult};
use crate::endpoint::{
    domain::{
        ChannelSpec, ConfigurationError, DeadLetterContext, DeadLetterEnvelope, EndpointState,
        FailureStage, LifecycleCell, Message, SendOptions,
    },
    ports::{EndpointEvent, EndpointObserver, EventLevel, MessageProducer},
};
use std::fmt;
use std::sync::Arc;

/// Sends annotated copies of failed messages to the dead-letter channel.
///
/// Failure to dead-letter is fatal: with no channel configured, or when the
/// dead-letter send itself fails, the error is raised to the caller. A send
/// failure observed after the endpoint began stopping is logged and dropped;
/// a missing channel is raised in every state.
pub struct DeadLetterRouter {
    endpoint: String,
    source: ChannelSpec,
    subscription_name: Option<String>,
    producer: Option<Arc<dyn MessageProducer>>,
    lifecycle: Arc<LifecycleCell>,
    observer: Arc<dyn EndpointObserver>,
}

impl DeadLetterRouter {
    /// Creates a router for one endpoint.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        source: ChannelSpec,
        subscription_name: Option<String>,
        producer: Option<Arc<dyn MessageProducer>>,
        lifecycle: Arc<LifecycleCell>,
        observer: Arc<dyn EndpointObserver>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            source,
            subscription_name,
            producer,
            lifecycle,
            observer,
        }
    }

    /// Routes `original` to the dead-letter channel.
    ///
    /// `annotate` runs after the standard diagnostic properties are written
    /// and before the envelope is sent. The envelope is sent with the
    /// original message's delivery mode, priority and expiration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NoDeadLetterChannel`] when no
    /// dead-letter channel is configured and
    /// [`EndpointError::DeadLetterDelivery`] when the send fails.
    pub fn route(
        &self,
        original: &Message,
        stage: FailureStage,
        cause: &dyn fmt::Display,
        annotate: &dyn Fn(&mut DeadLetterEnvelope),
    ) -> EndpointResult<()> {
        let reason = stage.reason(cause);
        self.observer
            .record(EndpointEvent::new(EventLevel::Info, &self.endpoint, &reason));

        let Some(producer) = &self.producer else {
            return Err(self.fatal(
                ConfigurationError::NoDeadLetterChannel {
                    endpoint: self.endpoint.clone(),
                    message_id: original.id(),
                    reason,
                }
                .into(),
            ));
        };

        let mut envelope = DeadLetterEnvelope::new(
            original,
            DeadLetterContext {
                endpoint_name: &self.endpoint,
                reason: &reason,
                source: &self.source,
                subscription_name: self.subscription_name.as_deref(),
            },
        );
        annotate(&mut envelope);

        producer
            .send(envelope.message(), SendOptions::from_message(original))
            .or_else(|source| {
                self.send_failed(EndpointError::DeadLetterDelivery {
                    endpoint: self.endpoint.clone(),
                    message_id: original.id(),
                    reason,
                    source,
                })
            })
    }

    fn send_failed(&self, err: EndpointError) -> EndpointResult<()> {
        let state = self.lifecycle.load();
        if matches!(state, EndpointState::Stopping | EndpointState::Editable) {
            let message =
                format!("Discarding dead-letter failure raised after shutdown began (state: {state})");
            self.observer.record(
                EndpointEvent::new(EventLevel::Warning, &self.endpoint, message).with_cause(&err),
            );
            return Ok(());
        }
        Err(self.fatal(err))
    }

    fn fatal(&self, err: EndpointError) -> EndpointError {
        self.observer
            .record(EndpointEvent::new(EventLevel::Fatal, &self.endpoint, err.to_string()));
        err
    }
}
