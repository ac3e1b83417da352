//! Transformer port for rewriting messages between source and destination.

use crate::endpoint::domain::{Message, TransformationError};

/// Produces the output message for an inbound message.
///
/// Returning `Ok(None)` drops the message without forwarding it.
pub trait MessageTransformer: Send + Sync {
    /// Transforms a message.
    ///
    /// # Errors
    ///
    /// Returns [`TransformationError`] when no output can be produced.
    fn transform(&self, message: &Message) -> Result<Option<Message>, TransformationError>;
}

impl<F> MessageTransformer for F
where
    F: Fn(&Message) -> Result<Option<Message>, TransformationError> + Send + Sync,
{
    fn transform(&self, message: &Message) -> Result<Option<Message>, TransformationError> {
        self(message)
    }
}
