//! Listener that records every delivered message.

use crate::endpoint::{domain::Message, ports::{ListenerError, MessageListener}};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Records delivered messages for later inspection.
///
/// Obtained from [`InMemoryBroker::collect`](super::InMemoryBroker::collect).
#[derive(Debug, Default)]
pub struct MessageCollector {
    messages: Mutex<Vec<Message>>,
}

impl MessageCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every message received so far, in delivery order.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.lock().clone()
    }

    /// Returns the number of messages received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forgets every received message.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MessageListener for MessageCollector {
    fn on_message(&self, message: &Message) -> Result<(), ListenerError> {
        self.lock().push(message.clone());
        Ok(())
    }
}
