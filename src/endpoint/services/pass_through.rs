//! Pass-through endpoint: verify, then hand off to application logic.

use super::{CleanupFailure, Delivery, Endpoint, EndpointKind, EndpointResult};
use crate::endpoint::{
    domain::{ConfigurationError, EndpointDefinition, FailureStage, Message},
    ports::{BrokerResult, BrokerSession, EndpointObserver, MessageHandler},
};
use std::sync::Arc;

/// Endpoint delivering verified messages to an application handler.
pub type PassThroughEndpoint = Endpoint<PassThrough>;

/// Pass-through behaviour wrapping a [`MessageHandler`].
#[derive(Clone)]
pub struct PassThrough {
    handler: Arc<dyn MessageHandler>,
}

impl PassThrough {
    /// Wraps an application handler.
    #[must_use]
    pub fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self { handler }
    }
}

impl EndpointKind for PassThrough {
    type Outbound = ();

    fn validate(&self, _endpoint: &str) -> Result<(), ConfigurationError> {
        Ok(())
    }

    fn apply_definition(
        &mut self,
        endpoint: &str,
        definition: &EndpointDefinition,
    ) -> Result<(), ConfigurationError> {
        if definition.destination.is_some() {
            return Err(ConfigurationError::DestinationNotSupported {
                endpoint: endpoint.to_owned(),
            });
        }
        if definition.output_verification_policy.is_some() {
            return Err(ConfigurationError::OutputPolicyNotSupported {
                endpoint: endpoint.to_owned(),
            });
        }
        Ok(())
    }

    fn open_outbound(&self, _session: &dyn BrokerSession) -> BrokerResult<Self::Outbound> {
        Ok(())
    }

    fn close_outbound(&self, _outbound: &Self::Outbound) -> Vec<CleanupFailure> {
        Vec::new()
    }

    fn handle_message(
        &self,
        delivery: &Delivery<'_, Self::Outbound>,
        message: &Message,
    ) -> EndpointResult<()> {
        self.handler
            .handle(delivery.session(), message)
            .or_else(|err| delivery.dead_letter(message, FailureStage::Handling, &err))
    }
}

impl Endpoint<PassThrough> {
    /// Creates an editable pass-through endpoint around `handler`.
    #[must_use]
    pub fn pass_through(
        handler: Arc<dyn MessageHandler>,
        observer: Arc<dyn EndpointObserver>,
    ) -> Self {
        Self::new(PassThrough::new(handler), observer)
    }
}
