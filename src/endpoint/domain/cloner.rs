//! Type-preserving message copies used for dead-lettering.

use super::{Message, MessageBody, ObjectPayload};

/// Produces copies of in-flight messages.
///
/// Each body kind has its own copy rule. Stream bodies are not copied; the
/// copy carries headers and properties only. The copy receives a fresh
/// [`MessageId`](super::MessageId).
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCloner;

impl MessageCloner {
    /// Returns a copy of `from` suitable for sending to a dead-letter channel.
    #[must_use]
    pub fn clone_for_dead_letter(from: &Message) -> Message {
        let mut to = Message::new(Self::copy_body(from.body()));
        Self::copy_headers(from, &mut to);
        to
    }

    /// Copies a body according to its kind.
    #[must_use]
    pub fn copy_body(body: &MessageBody) -> MessageBody {
        match body {
            MessageBody::Text(text) => MessageBody::Text(text.clone()),
            MessageBody::Map(entries) => MessageBody::Map(entries.clone()),
            MessageBody::Bytes(bytes) => MessageBody::Bytes(bytes.as_slice().to_vec()),
            // The payload is re-wrapped, not re-serialized; readers still need
            // the original type to decode it.
            MessageBody::Object(payload) => MessageBody::Object(ObjectPayload::new(
                payload.type_name(),
                payload.value().clone(),
            )),
            MessageBody::Stream(_) | MessageBody::Empty => MessageBody::Empty,
        }
    }

    /// Propagates correlation id, reply-to, type tag, delivery parameters and
    /// every application property from `from` onto `to`.
    pub fn copy_headers(from: &Message, to: &mut Message) {
        to.copy_headers_from(from);
    }
}
