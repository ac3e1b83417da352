//! Channel specifications naming a queue or topic on the broker.

use super::{ChannelSpecError, ChannelSpecResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix for queue channel specifications.
pub const QUEUE_PREFIX: &str = "queue://";

/// Prefix for topic channel specifications.
pub const TOPIC_PREFIX: &str = "topic://";

/// Kind of broker channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Point-to-point queue.
    Queue,
    /// Publish/subscribe topic.
    Topic,
}

impl ChannelKind {
    /// Returns the specification prefix for this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Queue => QUEUE_PREFIX,
            Self::Topic => TOPIC_PREFIX,
        }
    }

    /// Returns the canonical label for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queue => "Queue",
            Self::Topic => "Topic",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Immutable reference to a queue or topic.
///
/// The string form is `queue://<name>` or `topic://<name>`. The name is
/// passed through unescaped.
///
/// # Examples
///
/// ```
/// use message_link::endpoint::domain::ChannelSpec;
///
/// let spec = ChannelSpec::parse("topic://orders").expect("valid spec");
/// assert!(spec.is_topic());
/// assert_eq!(spec.name(), "orders");
/// assert_eq!(spec.to_spec(), "topic://orders");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelSpec {
    kind: ChannelKind,
    name: String,
}

impl ChannelSpec {
    /// Creates a queue specification.
    #[must_use]
    pub fn queue(name: impl Into<String>) -> Self {
        Self {
            kind: ChannelKind::Queue,
            name: name.into(),
        }
    }

    /// Creates a topic specification.
    #[must_use]
    pub fn topic(name: impl Into<String>) -> Self {
        Self {
            kind: ChannelKind::Topic,
            name: name.into(),
        }
    }

    /// Parses a channel specification string.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelSpecError::Empty`] for an empty string and
    /// [`ChannelSpecError::UnknownPrefix`] when the string starts with neither
    /// `queue://` nor `topic://`.
    pub fn parse(spec: &str) -> ChannelSpecResult<Self> {
        if spec.is_empty() {
            return Err(ChannelSpecError::Empty);
        }

        [ChannelKind::Queue, ChannelKind::Topic]
            .into_iter()
            .find_map(|kind| {
                spec.strip_prefix(kind.prefix()).map(|name| Self {
                    kind,
                    name: name.to_owned(),
                })
            })
            .ok_or_else(|| ChannelSpecError::UnknownPrefix(spec.to_owned()))
    }

    /// Returns the channel kind.
    #[must_use]
    pub const fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Returns the channel name without its prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` for topic channels.
    #[must_use]
    pub const fn is_topic(&self) -> bool {
        matches!(self.kind, ChannelKind::Topic)
    }

    /// Serializes back to the `queue://` / `topic://` form.
    #[must_use]
    pub fn to_spec(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.name)
    }
}

impl fmt::Display for ChannelSpec {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}{}", self.kind.prefix(), self.name)
    }
}

impl FromStr for ChannelSpec {
    type Err = ChannelSpecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for ChannelSpec {
    type Error = ChannelSpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ChannelSpec> for String {
    fn from(value: ChannelSpec) -> Self {
        value.to_spec()
    }
}
