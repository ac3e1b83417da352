//! Service-level errors for endpoint lifecycle and message handling.

use crate::endpoint::{
    domain::{ConfigurationError, MessageId},
    ports::BrokerError,
};
use thiserror::Error;

/// Result type for endpoint operations.
pub type EndpointResult<T> = Result<T, EndpointError>;

/// Errors raised by endpoints.
///
/// Pipeline-stage failures never appear here; they are dead-lettered. Only
/// setup problems, start-up transport failures, and failures of the
/// dead-letter path itself escalate.
#[derive(Debug, Clone, Error)]
pub enum EndpointError {
    /// Invalid or incomplete configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Transport failure while acquiring broker resources.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Sending to the dead-letter channel failed; there is no further
    /// fallback.
    #[error(
        "Endpoint ({endpoint}) failed to send message {message_id} to dead-letter channel. Original error: {reason}"
    )]
    DeadLetterDelivery {
        /// Endpoint name.
        endpoint: String,
        /// Identifier of the failing inbound message.
        message_id: MessageId,
        /// Failure reason that triggered dead-lettering.
        reason: String,
        /// Transport error from the dead-letter send.
        #[source]
        source: BrokerError,
    },
}

impl EndpointError {
    /// Returns `true` for configuration errors.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
