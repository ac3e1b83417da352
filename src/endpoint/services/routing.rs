//! Routing endpoint: verify, transform, verify again, forward.

use super::{CleanupFailure, Delivery, Endpoint, EndpointKind, EndpointResult};
use crate::endpoint::{
    domain::{
        ChannelSpec, ConfigurationError, DeadLetterEnvelope, EndpointDefinition, FailureStage,
        Message, OutputVerificationPolicy, SendOptions,
    },
    ports::{
        BrokerError, BrokerResult, BrokerSession, MessageProducer, MessageTransformer,
        MessageVerifier,
    },
};
use std::fmt;
use std::sync::Arc;

/// Endpoint forwarding every verified message to a destination channel.
pub type RoutingEndpoint = Endpoint<Routing>;

/// Routing configuration and behaviour.
#[derive(Clone, Default)]
pub struct Routing {
    destination: Option<ChannelSpec>,
    output_verifier: Option<Arc<dyn MessageVerifier>>,
    transformer: Option<Arc<dyn MessageTransformer>>,
    output_policy: OutputVerificationPolicy,
}

impl Routing {
    /// Returns the destination channel, if configured.
    #[must_use]
    pub const fn destination(&self) -> Option<&ChannelSpec> {
        self.destination.as_ref()
    }

    /// Returns the output verification policy.
    #[must_use]
    pub const fn output_policy(&self) -> OutputVerificationPolicy {
        self.output_policy
    }

    fn generate(
        &self,
        delivery: &Delivery<'_, Box<dyn MessageProducer>>,
        message: &Message,
    ) -> EndpointResult<Option<Message>> {
        let Some(transformer) = &self.transformer else {
            return Ok(Some(message.clone()));
        };
        transformer.transform(message).or_else(|err| {
            delivery
                .dead_letter(message, FailureStage::Transformation, &err)
                .map(|()| None)
        })
    }
}

impl EndpointKind for Routing {
    type Outbound = Box<dyn MessageProducer>;

    fn validate(&self, endpoint: &str) -> Result<(), ConfigurationError> {
        if self.destination.is_none() {
            return Err(ConfigurationError::MissingDestination {
                endpoint: endpoint.to_owned(),
            });
        }
        Ok(())
    }

    fn apply_definition(
        &mut self,
        _endpoint: &str,
        definition: &EndpointDefinition,
    ) -> Result<(), ConfigurationError> {
        self.destination.clone_from(&definition.destination);
        if let Some(policy) = definition.output_verification_policy {
            self.output_policy = policy;
        }
        Ok(())
    }

    fn open_outbound(&self, session: &dyn BrokerSession) -> BrokerResult<Self::Outbound> {
        let Some(channel) = &self.destination else {
            return Err(BrokerError::Closed("destination"));
        };
        let destination = session.resolve_destination(channel)?;
        session.create_producer(&destination)
    }

    fn close_outbound(&self, outbound: &Self::Outbound) -> Vec<CleanupFailure> {
        outbound
            .close()
            .err()
            .map(|err| ("producer for destination channel", err))
            .into_iter()
            .collect()
    }

    fn handle_message(
        &self,
        delivery: &Delivery<'_, Self::Outbound>,
        message: &Message,
    ) -> EndpointResult<()> {
        let Some(output) = self.generate(delivery, message)? else {
            delivery.trace(format!("No message generated for {}", message.id()));
            return Ok(());
        };

        if let Some(verifier) = &self.output_verifier
            && let Err(err) = verifier.verify(&output)
        {
            delivery.dead_letter(message, FailureStage::OutputVerification, &err)?;
            if self.output_policy == OutputVerificationPolicy::DeadLetterOnly {
                return Ok(());
            }
        }

        delivery
            .outbound()
            .send(&output, SendOptions::from_message(message))
            .map(|()| delivery.trace(format!("Forwarded message {}", message.id())))
            .or_else(|err| delivery.dead_letter(message, FailureStage::Delivery, &err))
    }

    fn annotate_dead_letter(&self, envelope: &mut DeadLetterEnvelope) {
        if let Some(destination) = &self.destination {
            envelope.set_destination_channel(destination);
        }
    }
}

impl fmt::Debug for Routing {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Routing")
            .field("destination", &self.destination)
            .field("output_verifier", &self.output_verifier.is_some())
            .field("transformer", &self.transformer.is_some())
            .field("output_policy", &self.output_policy)
            .finish()
    }
}

impl Endpoint<Routing> {
    /// Sets the destination channel.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotEditable`] unless editable.
    pub fn set_destination(&mut self, destination: ChannelSpec) -> Result<&mut Self, ConfigurationError> {
        self.kind_mut()?.destination = Some(destination);
        Ok(self)
    }

    /// Sets or clears the verifier applied to generated messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotEditable`] unless editable.
    pub fn set_output_verifier(
        &mut self,
        verifier: Option<Arc<dyn MessageVerifier>>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.kind_mut()?.output_verifier = verifier;
        Ok(self)
    }

    /// Sets or clears the transformer. Without one, inbound messages are
    /// forwarded unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotEditable`] unless editable.
    pub fn set_transformer(
        &mut self,
        transformer: Option<Arc<dyn MessageTransformer>>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.kind_mut()?.transformer = transformer;
        Ok(self)
    }

    /// Chooses whether a generated message that fails output verification
    /// is still sent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotEditable`] unless editable.
    pub fn set_output_verification_policy(
        &mut self,
        policy: OutputVerificationPolicy,
    ) -> Result<&mut Self, ConfigurationError> {
        self.kind_mut()?.output_policy = policy;
        Ok(self)
    }
}
