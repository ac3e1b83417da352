//! Dead-letter envelope construction and diagnostic property names.

use super::{ChannelSpec, Message, MessageCloner};
use std::fmt;

/// Property holding the name of the endpoint that failed.
pub const ENDPOINT_NAME_PROPERTY: &str = "EndpointName";
/// Property holding the failure reason.
pub const FAILURE_REASON_PROPERTY: &str = "FailureReason";
/// Property holding the source channel specification.
pub const SOURCE_CHANNEL_PROPERTY: &str = "SourceChannel";
/// Property holding the durable subscription name, when one is configured.
pub const SOURCE_SUBSCRIPTION_PROPERTY: &str = "SourceSubscriptionName";
/// Property holding the destination channel specification (routing only).
pub const DESTINATION_CHANNEL_PROPERTY: &str = "DestinationChannel";
/// Property holding the original body kind.
pub const ORIGINAL_MESSAGE_KIND_PROPERTY: &str = "OriginalMessageKind";

/// Pipeline stage at which a message failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    /// The input verifier rejected the message.
    InputVerification,
    /// Pass-through application logic failed.
    Handling,
    /// The transformer failed.
    Transformation,
    /// The output verifier rejected the generated message.
    OutputVerification,
    /// Sending the generated message to the destination failed.
    Delivery,
}

impl FailureStage {
    /// Returns the human-readable stage description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InputVerification => "Incoming message failed precondition check",
            Self::Handling => "Error handling message",
            Self::Transformation => "Incoming message failed during transformation",
            Self::OutputVerification => "Generated message failed send precondition check",
            Self::Delivery => "Failed to send generated message to destination",
        }
    }

    /// Formats the failure reason for a cause.
    #[must_use]
    pub fn reason(self, cause: &dyn fmt::Display) -> String {
        format!("{}. Error: {cause}", self.description())
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.description())
    }
}

/// Diagnostic context attached to every dead-lettered message.
#[derive(Debug, Clone, Copy)]
pub struct DeadLetterContext<'a> {
    /// Endpoint name.
    pub endpoint_name: &'a str,
    /// Failure reason.
    pub reason: &'a str,
    /// Source channel.
    pub source: &'a ChannelSpec,
    /// Durable subscription name, if any.
    pub subscription_name: Option<&'a str>,
}

/// Annotated copy of a failed message, built once per failure.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetterEnvelope {
    message: Message,
}

impl DeadLetterEnvelope {
    /// Clones `original` and appends the diagnostic properties.
    #[must_use]
    pub fn new(original: &Message, context: DeadLetterContext<'_>) -> Self {
        let mut message = MessageCloner::clone_for_dead_letter(original);
        message.set_property(ENDPOINT_NAME_PROPERTY, context.endpoint_name);
        message.set_property(FAILURE_REASON_PROPERTY, context.reason);
        message.set_property(SOURCE_CHANNEL_PROPERTY, context.source.to_spec());
        if let Some(subscription) = context.subscription_name {
            message.set_property(SOURCE_SUBSCRIPTION_PROPERTY, subscription);
        }
        message.set_property(ORIGINAL_MESSAGE_KIND_PROPERTY, original.kind().as_str());
        Self { message }
    }

    /// Records the destination channel of a routing endpoint.
    pub fn set_destination_channel(&mut self, destination: &ChannelSpec) {
        self.annotate(DESTINATION_CHANNEL_PROPERTY, destination.to_spec());
    }

    /// Adds an endpoint-specific annotation.
    pub fn annotate(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.message.set_property(name, value.into());
    }

    /// Returns the annotated message.
    #[must_use]
    pub const fn message(&self) -> &Message {
        &self.message
    }

    /// Consumes the envelope, returning the annotated message.
    #[must_use]
    pub fn into_message(self) -> Message {
        self.message
    }
}
