//! Domain model for message endpoints.
//!
//! Channel specifications, the in-flight message envelope, lifecycle
//! states, dead-letter envelopes, and the error taxonomy. Broker access and
//! orchestration remain outside this boundary.

mod channel;
mod cloner;
mod dead_letter;
mod definition;
mod error;
mod message;
mod state;

pub use channel::{ChannelKind, ChannelSpec, QUEUE_PREFIX, TOPIC_PREFIX};
pub use cloner::MessageCloner;
pub use dead_letter::{
    DESTINATION_CHANNEL_PROPERTY, DeadLetterContext, DeadLetterEnvelope, ENDPOINT_NAME_PROPERTY,
    FAILURE_REASON_PROPERTY, FailureStage, ORIGINAL_MESSAGE_KIND_PROPERTY,
    SOURCE_CHANNEL_PROPERTY, SOURCE_SUBSCRIPTION_PROPERTY,
};
pub use definition::{EndpointDefinition, OutputVerificationPolicy};
pub use error::{
    ChannelSpecError, ChannelSpecResult, ConfigurationError, HandlerError, TransformationError,
    UnexpectedBodyKind, VerificationError,
};
pub use message::{
    DeliveryMode, Message, MessageBody, MessageHeaders, MessageId, MessageKind, ObjectPayload,
    Priority, PropertyValue, SendOptions,
};
pub use state::{EndpointState, LifecycleCell};
