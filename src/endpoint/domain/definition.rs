//! Declarative endpoint configuration loaded from JSON.

use super::ChannelSpec;
use serde::{Deserialize, Serialize};

/// What happens to a generated message that fails output verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputVerificationPolicy {
    /// Dead-letter the inbound message and still send the generated one.
    #[default]
    DeadLetterAndSend,
    /// Dead-letter the inbound message and drop the generated one.
    DeadLetterOnly,
}

/// Serializable endpoint configuration.
///
/// Verifiers, transformers and handlers are code, not data, and are wired
/// programmatically after the definition is applied.
///
/// # Examples
///
/// ```
/// use message_link::endpoint::domain::EndpointDefinition;
///
/// let definition = EndpointDefinition::from_json(
///     r#"{
///         "name": "OrderLink",
///         "source": "queue://orders.in",
///         "destination": "topic://orders",
///         "dead_letter_channel": "orders.dlq"
///     }"#,
/// )
/// .expect("valid definition");
/// assert_eq!(definition.name.as_deref(), Some("OrderLink"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointDefinition {
    /// Endpoint name used in diagnostics.
    #[serde(default)]
    pub name: Option<String>,
    /// Source channel.
    #[serde(default)]
    pub source: Option<ChannelSpec>,
    /// Durable subscription name; topics only.
    #[serde(default)]
    pub subscription_name: Option<String>,
    /// Selector filtering delivered messages.
    #[serde(default)]
    pub selector: Option<String>,
    /// Dead-letter queue name.
    #[serde(default)]
    pub dead_letter_channel: Option<String>,
    /// Destination channel; routing endpoints only.
    #[serde(default)]
    pub destination: Option<ChannelSpec>,
    /// Output verification policy; routing endpoints only.
    #[serde(default)]
    pub output_verification_policy: Option<OutputVerificationPolicy>,
}

impl EndpointDefinition {
    /// Parses a definition from JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed JSON, unknown fields, or
    /// invalid channel specifications.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
