//! Observer forwarding endpoint events to `tracing`.

use crate::endpoint::ports::{EndpointEvent, EndpointObserver, EventLevel};

/// Emits every endpoint event as a structured `tracing` event.
///
/// Fatal events are logged at error level. Installing a subscriber is left
/// to the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl EndpointObserver for TracingObserver {
    fn record(&self, event: EndpointEvent) {
        let EndpointEvent {
            level,
            endpoint,
            message,
            cause,
        } = event;
        let cause = cause.unwrap_or_default();
        match level {
            EventLevel::Debug => tracing::debug!(%endpoint, %cause, "{message}"),
            EventLevel::Info => tracing::info!(%endpoint, %cause, "{message}"),
            EventLevel::Warning => tracing::warn!(%endpoint, %cause, "{message}"),
            EventLevel::Fatal => tracing::error!(%endpoint, %cause, "{message}"),
        }
    }
}
