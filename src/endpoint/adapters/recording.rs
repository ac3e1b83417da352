//! Observer capturing endpoint events in memory.

use crate::endpoint::ports::{EndpointEvent, EndpointObserver, EventLevel};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

/// Captures events for later inspection.
///
/// Clones share the same event log.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<RwLock<Vec<EndpointEvent>>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded event in order.
    #[must_use]
    pub fn events(&self) -> Vec<EndpointEvent> {
        self.read().clone()
    }

    /// Returns the events recorded at `level`.
    #[must_use]
    pub fn events_at(&self, level: EventLevel) -> Vec<EndpointEvent> {
        self.read()
            .iter()
            .filter(|event| event.level == level)
            .cloned()
            .collect()
    }

    /// Returns `true` when an event at `level` contains `text` in its message
    /// or cause.
    #[must_use]
    pub fn contains(&self, level: EventLevel, text: &str) -> bool {
        self.read().iter().any(|event| {
            event.level == level
                && (event.message.contains(text)
                    || event.cause.as_deref().is_some_and(|cause| cause.contains(text)))
        })
    }

    /// Discards every recorded event.
    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<EndpointEvent>> {
        self.events.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EndpointObserver for RecordingObserver {
    fn record(&self, event: EndpointEvent) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
