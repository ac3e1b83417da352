//! Per-message processing pipeline attached to the broker consumer.

use super::{DeadLetterRouter, EndpointKind, EndpointResult, EndpointSettings};
use crate::endpoint::{
    domain::{DeadLetterEnvelope, FailureStage, Message},
    ports::{
        BrokerSession, EndpointEvent, EndpointObserver, EventLevel, ListenerError, MessageListener,
    },
};
use std::fmt;
use std::sync::Arc;

/// Per-message view handed to an [`EndpointKind`].
///
/// Borrowed from the pipeline for the duration of one delivery.
pub struct Delivery<'a, O> {
    session: &'a dyn BrokerSession,
    outbound: &'a O,
    router: &'a DeadLetterRouter,
    annotate: &'a dyn Fn(&mut DeadLetterEnvelope),
    observer: &'a dyn EndpointObserver,
    endpoint: &'a str,
}

impl<'a, O> Delivery<'a, O> {
    /// Returns the endpoint's broker session.
    #[must_use]
    pub fn session(&self) -> &'a dyn BrokerSession {
        self.session
    }

    /// Returns the kind-specific outbound resources opened at start.
    #[must_use]
    pub const fn outbound(&self) -> &'a O {
        self.outbound
    }

    /// Routes `message` to the dead-letter channel for a failure at `stage`.
    ///
    /// # Errors
    ///
    /// Propagates dead-letter failures from [`DeadLetterRouter::route`].
    pub fn dead_letter(
        &self,
        message: &Message,
        stage: FailureStage,
        cause: &dyn fmt::Display,
    ) -> EndpointResult<()> {
        self.router.route(message, stage, cause, self.annotate)
    }

    /// Emits a debug event for this endpoint.
    pub fn trace(&self, message: impl Into<String>) {
        self.observer
            .record(EndpointEvent::new(EventLevel::Debug, self.endpoint, message));
    }
}

/// Listener registered on the source consumer.
///
/// Holds snapshots of the endpoint configuration taken at `start()`, so it
/// never observes later edits.
pub struct MessagePipeline<K: EndpointKind> {
    settings: Arc<EndpointSettings>,
    kind: Arc<K>,
    outbound: Arc<K::Outbound>,
    session: Arc<dyn BrokerSession>,
    router: DeadLetterRouter,
    observer: Arc<dyn EndpointObserver>,
}

impl<K: EndpointKind> MessagePipeline<K> {
    /// Assembles a pipeline from started resources.
    #[must_use]
    pub fn new(
        settings: Arc<EndpointSettings>,
        kind: Arc<K>,
        outbound: Arc<K::Outbound>,
        session: Arc<dyn BrokerSession>,
        router: DeadLetterRouter,
        observer: Arc<dyn EndpointObserver>,
    ) -> Self {
        Self {
            settings,
            kind,
            outbound,
            session,
            router,
            observer,
        }
    }

    /// Runs input verification and then the kind's handling step.
    ///
    /// Every stage failure is dead-lettered; only dead-letter failures
    /// escape.
    ///
    /// # Errors
    ///
    /// Returns an [`EndpointError`](super::EndpointError) when a failed
    /// message cannot be dead-lettered.
    pub fn process(&self, message: &Message) -> EndpointResult<()> {
        let annotate = |envelope: &mut DeadLetterEnvelope| self.kind.annotate_dead_letter(envelope);
        let delivery = Delivery {
            session: self.session.as_ref(),
            outbound: self.outbound.as_ref(),
            router: &self.router,
            annotate: &annotate,
            observer: self.observer.as_ref(),
            endpoint: self.settings.name(),
        };

        delivery.trace(format!("Starting to process message: {}", message.id()));

        if let Some(verifier) = self.settings.input_verifier()
            && let Err(err) = verifier.verify(message)
        {
            return delivery.dead_letter(message, FailureStage::InputVerification, &err);
        }

        self.kind.handle_message(&delivery, message)
    }
}

impl<K: EndpointKind> MessageListener for MessagePipeline<K> {
    fn on_message(&self, message: &Message) -> Result<(), ListenerError> {
        self.process(message).map_err(ListenerError::from)
    }
}
