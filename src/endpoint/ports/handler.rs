//! Application handler port for pass-through endpoints.

use super::BrokerSession;
use crate::endpoint::domain::{HandlerError, Message};

/// Application logic invoked with every verified message.
pub trait MessageHandler: Send + Sync {
    /// Handles a message.
    ///
    /// The endpoint's session is supplied so handlers can reply or publish
    /// follow-up messages.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the message cannot be handled; the
    /// endpoint then dead-letters it.
    fn handle(&self, session: &dyn BrokerSession, message: &Message) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&dyn BrokerSession, &Message) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, session: &dyn BrokerSession, message: &Message) -> Result<(), HandlerError> {
        self(session, message)
    }
}
