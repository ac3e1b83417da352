//! Error types for endpoint domain validation and message processing.

use super::{ChannelSpec, EndpointState, MessageId, MessageKind};
use thiserror::Error;

/// Result type for channel specification parsing.
pub type ChannelSpecResult<T> = Result<T, ChannelSpecError>;

/// Format errors returned while parsing a channel specification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelSpecError {
    /// The specification string is empty.
    #[error("channel specification must not be empty")]
    Empty,

    /// The specification starts with neither `queue://` nor `topic://`.
    #[error("invalid channel specification '{0}', expected 'queue://<name>' or 'topic://<name>'")]
    UnknownPrefix(String),
}

/// Invalid or incomplete endpoint setup.
///
/// Raised synchronously from setters and `start()`, and from the delivery
/// callback when a failing message has nowhere to go. Never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A setter was called while the endpoint is not editable.
    #[error("Endpoint ({endpoint}) invalid. Reason: attempting to edit active endpoint (state: {state})")]
    NotEditable {
        /// Endpoint name.
        endpoint: String,
        /// Lifecycle state observed by the setter.
        state: EndpointState,
    },

    /// `start()` was called on an endpoint that is already started.
    #[error("Endpoint ({endpoint}) invalid. Reason: endpoint already started (state: {state})")]
    AlreadyStarted {
        /// Endpoint name.
        endpoint: String,
        /// Lifecycle state observed by `start()`.
        state: EndpointState,
    },

    /// No source channel was configured.
    #[error("Endpoint ({endpoint}) invalid. Reason: source not specified")]
    MissingSource {
        /// Endpoint name.
        endpoint: String,
    },

    /// A routing endpoint has no destination channel.
    #[error("Endpoint ({endpoint}) invalid. Reason: destination not specified")]
    MissingDestination {
        /// Endpoint name.
        endpoint: String,
    },

    /// A durable subscription name was set on a queue source.
    #[error(
        "Endpoint ({endpoint}) invalid. Reason: subscriptionName should only be specified for topics (source: {source_channel})"
    )]
    SubscriptionRequiresTopic {
        /// Endpoint name.
        endpoint: String,
        /// The configured non-topic source.
        source_channel: ChannelSpec,
    },

    /// The endpoint variant does not accept a destination channel.
    #[error("Endpoint ({endpoint}) invalid. Reason: destination is not supported by this endpoint")]
    DestinationNotSupported {
        /// Endpoint name.
        endpoint: String,
    },

    /// The endpoint variant never sends generated messages.
    #[error(
        "Endpoint ({endpoint}) invalid. Reason: output verification policy is not supported by this endpoint"
    )]
    OutputPolicyNotSupported {
        /// Endpoint name.
        endpoint: String,
    },

    /// A message failed processing and no dead-letter channel is configured.
    #[error(
        "Endpoint ({endpoint}) unable to handle message {message_id} and no dead-letter channel to send it to. Reason: {reason}"
    )]
    NoDeadLetterChannel {
        /// Endpoint name.
        endpoint: String,
        /// Identifier of the failing message.
        message_id: MessageId,
        /// Failure reason that triggered dead-lettering.
        reason: String,
    },
}

/// A message body did not have the kind a collaborator expected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "Message with ID = {message_id} is not of the expected type {expected}. Actual Message Type: {actual}"
)]
pub struct UnexpectedBodyKind {
    /// Identifier of the inspected message.
    pub message_id: MessageId,
    /// Kind the caller required.
    pub expected: MessageKind,
    /// Kind the message carries.
    pub actual: MessageKind,
}

/// A message failed an application-defined format or content check.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct VerificationError {
    message: String,
}

impl VerificationError {
    /// Creates a verification failure with a free-form description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Creates a verification failure describing a problem with `message`.
    ///
    /// The description is prefixed with `Message with ID = <id>`.
    #[must_use]
    pub fn for_message(message: &super::Message, problem: impl AsRef<str>) -> Self {
        Self::new(format!("{} {}", describe(message), problem.as_ref()))
    }
}

impl From<UnexpectedBodyKind> for VerificationError {
    fn from(err: UnexpectedBodyKind) -> Self {
        Self::new(err.to_string())
    }
}

/// A transformer could not produce an output message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransformationError {
    message: String,
}

impl TransformationError {
    /// Creates a transformation failure with a free-form description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Creates a transformation failure describing a problem with `message`.
    #[must_use]
    pub fn for_message(message: &super::Message, problem: impl AsRef<str>) -> Self {
        Self::new(format!("{} {}", describe(message), problem.as_ref()))
    }
}

impl From<UnexpectedBodyKind> for TransformationError {
    fn from(err: UnexpectedBodyKind) -> Self {
        Self::new(err.to_string())
    }
}

/// Application logic of a pass-through endpoint rejected a message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Creates a handler failure with a free-form description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<UnexpectedBodyKind> for HandlerError {
    fn from(err: UnexpectedBodyKind) -> Self {
        Self::new(err.to_string())
    }
}

fn describe(message: &super::Message) -> String {
    format!("Message with ID = {}", message.id())
}
