//! Diagnostic sink port for endpoint events.

use std::fmt;

/// Severity of an endpoint event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventLevel {
    /// Per-message tracing.
    Debug,
    /// Recoverable failures routed to the dead-letter channel.
    Info,
    /// Cleanup failures and configuration problems.
    Warning,
    /// Failures the endpoint cannot handle itself.
    Fatal,
}

impl EventLevel {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A diagnostic event emitted by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointEvent {
    /// Severity.
    pub level: EventLevel,
    /// Name of the emitting endpoint.
    pub endpoint: String,
    /// Description of what happened.
    pub message: String,
    /// Rendered cause, if any.
    pub cause: Option<String>,
}

impl EndpointEvent {
    /// Creates an event without a cause.
    #[must_use]
    pub fn new(level: EventLevel, endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            endpoint: endpoint.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Attaches a rendered cause.
    #[must_use]
    pub fn with_cause(mut self, cause: &dyn fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

/// Receives endpoint diagnostics.
///
/// Injected into endpoints so hosts choose where events go and tests can
/// assert on them directly.
pub trait EndpointObserver: Send + Sync {
    /// Records one event.
    fn record(&self, event: EndpointEvent);
}
