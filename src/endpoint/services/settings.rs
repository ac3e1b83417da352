//! Configuration shared by every endpoint variant.

use crate::endpoint::{
    domain::{ChannelSpec, ConfigurationError},
    ports::MessageVerifier,
};
use std::fmt;
use std::sync::Arc;

/// Name reported for endpoints that were never named.
pub const UNNAMED_ENDPOINT: &str = "unnamed";

/// Source-side configuration of an endpoint.
///
/// Mutated only through the owning [`Endpoint`](super::Endpoint), which
/// rejects changes unless it is editable.
#[derive(Clone, Default)]
pub struct EndpointSettings {
    name: Option<String>,
    source: Option<ChannelSpec>,
    subscription_name: Option<String>,
    selector: Option<String>,
    dead_letter_channel: Option<String>,
    input_verifier: Option<Arc<dyn MessageVerifier>>,
}

impl EndpointSettings {
    /// Returns the endpoint name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED_ENDPOINT)
    }

    /// Returns the source channel, if configured.
    #[must_use]
    pub const fn source(&self) -> Option<&ChannelSpec> {
        self.source.as_ref()
    }

    /// Returns the durable subscription name, if any.
    #[must_use]
    pub fn subscription_name(&self) -> Option<&str> {
        self.subscription_name.as_deref()
    }

    /// Returns the selector, if any.
    #[must_use]
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    /// Returns the dead-letter queue name, if any.
    #[must_use]
    pub fn dead_letter_channel(&self) -> Option<&str> {
        self.dead_letter_channel.as_deref()
    }

    /// Returns the input verifier, if any.
    #[must_use]
    pub fn input_verifier(&self) -> Option<&dyn MessageVerifier> {
        self.input_verifier.as_deref()
    }

    /// Checks the source-side configuration and returns the source channel.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingSource`] when no source is set
    /// and [`ConfigurationError::SubscriptionRequiresTopic`] when a
    /// subscription name is combined with a queue source.
    pub fn validate(&self) -> Result<&ChannelSpec, ConfigurationError> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| ConfigurationError::MissingSource {
                endpoint: self.name().to_owned(),
            })?;

        if self.subscription_name.is_some() && !source.is_topic() {
            return Err(ConfigurationError::SubscriptionRequiresTopic {
                endpoint: self.name().to_owned(),
                source_channel: source.clone(),
            });
        }

        Ok(source)
    }

    pub(crate) fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub(crate) fn set_source(&mut self, source: Option<ChannelSpec>) {
        self.source = source;
    }

    pub(crate) fn set_subscription_name(&mut self, subscription_name: Option<String>) {
        self.subscription_name = subscription_name;
    }

    pub(crate) fn set_selector(&mut self, selector: Option<String>) {
        self.selector = selector;
    }

    pub(crate) fn set_dead_letter_channel(&mut self, dead_letter_channel: Option<String>) {
        self.dead_letter_channel = dead_letter_channel;
    }

    pub(crate) fn set_input_verifier(&mut self, verifier: Option<Arc<dyn MessageVerifier>>) {
        self.input_verifier = verifier;
    }
}

impl fmt::Debug for EndpointSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("EndpointSettings")
            .field("name", &self.name())
            .field("source", &self.source)
            .field("subscription_name", &self.subscription_name)
            .field("selector", &self.selector)
            .field("dead_letter_channel", &self.dead_letter_channel)
            .field("input_verifier", &self.input_verifier.is_some())
            .finish()
    }
}
