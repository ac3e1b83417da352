//! In-flight message envelope: body, headers, and application properties.

use super::{ChannelSpec, UnexpectedBodyKind};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier assigned to every message instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a message identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "ID:{}", self.0)
    }
}

/// Value stored in a message property or a map body entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(String),
    /// Raw bytes (map bodies only in most brokers).
    Bytes(Vec<u8>),
}

impl PropertyValue {
    /// Returns the integer value, if this is an integer.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string value, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(formatter, "{value}"),
            Self::Int(value) => write!(formatter, "{value}"),
            Self::Float(value) => write!(formatter, "{value}"),
            Self::String(value) => formatter.write_str(value),
            Self::Bytes(value) => write!(formatter, "<{} bytes>", value.len()),
        }
    }
}

/// Opaque serializable payload carried by an object message.
///
/// The payload is held in its serialized form together with the name of the
/// type it was produced from. Reading it back requires that type to be
/// available to the reader.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPayload {
    type_name: String,
    value: serde_json::Value,
}

impl ObjectPayload {
    /// Wraps an already-serialized value.
    #[must_use]
    pub fn new(type_name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }

    /// Serializes `payload`, recording its type name.
    ///
    /// # Errors
    ///
    /// Returns the serializer error when `payload` cannot be represented.
    pub fn from_serializable<T: Serialize>(payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            std::any::type_name::<T>(),
            serde_json::to_value(payload)?,
        ))
    }

    /// Deserializes the payload as `T`.
    ///
    /// # Errors
    ///
    /// Returns the deserializer error when the payload does not describe a
    /// `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.value.clone())
    }

    /// Returns the recorded type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the serialized value.
    #[must_use]
    pub const fn value(&self) -> &serde_json::Value {
        &self.value
    }
}

/// Body of a message, one variant per broker message kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MessageBody {
    /// No body; header-only message.
    #[default]
    Empty,
    /// Text payload.
    Text(String),
    /// Key/value payload. Key order carries no meaning.
    Map(BTreeMap<String, PropertyValue>),
    /// Raw byte payload.
    Bytes(Vec<u8>),
    /// Serialized object payload.
    Object(ObjectPayload),
    /// Sequence of primitive values read in order.
    Stream(Vec<PropertyValue>),
}

impl MessageBody {
    /// Returns the kind tag for this body.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Empty => MessageKind::Unknown,
            Self::Text(_) => MessageKind::Text,
            Self::Map(_) => MessageKind::Map,
            Self::Bytes(_) => MessageKind::Bytes,
            Self::Object(_) => MessageKind::Object,
            Self::Stream(_) => MessageKind::Stream,
        }
    }
}

/// Kind tag recorded on dead-lettered messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Text body.
    Text,
    /// Map body.
    Map,
    /// Bytes body.
    Bytes,
    /// Object body.
    Object,
    /// Stream body.
    Stream,
    /// No body or an unrecognized kind.
    Unknown,
}

impl MessageKind {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Map => "Map",
            Self::Bytes => "Bytes",
            Self::Object => "Object",
            Self::Stream => "Stream",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Broker delivery guarantee requested for a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeliveryMode {
    /// Message survives broker restarts.
    #[default]
    Persistent,
    /// Message may be lost on broker failure.
    NonPersistent,
}

/// Message priority in the range `0..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Priority(u8);

impl Priority {
    /// Highest accepted priority.
    pub const MAX: Self = Self(9);

    /// Broker default priority.
    pub const DEFAULT: Self = Self(4);

    /// Creates a priority, clamping values above [`Priority::MAX`].
    #[must_use]
    pub const fn new(value: u8) -> Self {
        if value > Self::MAX.0 {
            Self::MAX
        } else {
            Self(value)
        }
    }

    /// Returns the numeric priority.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Delivery parameters passed explicitly to a producer on each send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendOptions {
    /// Delivery mode.
    pub delivery_mode: DeliveryMode,
    /// Message priority.
    pub priority: Priority,
    /// Time-to-live; `None` never expires.
    pub expiration: Option<Duration>,
}

impl SendOptions {
    /// Returns the delivery parameters recorded on `message`.
    #[must_use]
    pub const fn from_message(message: &Message) -> Self {
        Self {
            delivery_mode: message.headers.delivery_mode,
            priority: message.headers.priority,
            expiration: message.headers.expiration,
        }
    }
}

/// Standard message headers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageHeaders {
    /// Application correlation identifier.
    pub correlation_id: Option<String>,
    /// Channel replies should be sent to.
    pub reply_to: Option<ChannelSpec>,
    /// Application type tag.
    pub message_type: Option<String>,
    /// Delivery mode the message was sent with.
    pub delivery_mode: DeliveryMode,
    /// Priority the message was sent with.
    pub priority: Priority,
    /// Time-to-live the message was sent with.
    pub expiration: Option<Duration>,
    /// Channel the message was last sent to; set by the broker.
    pub destination: Option<ChannelSpec>,
    /// Send timestamp; set by the broker.
    pub timestamp: Option<DateTime<Utc>>,
}

/// A message delivered to, or produced by, an endpoint.
///
/// # Examples
///
/// ```
/// use message_link::endpoint::domain::{Message, MessageKind};
///
/// let message = Message::text("hello").with_property("attempt", 1);
/// assert_eq!(message.kind(), MessageKind::Text);
/// assert_eq!(message.int_property("attempt"), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    headers: MessageHeaders,
    properties: BTreeMap<String, PropertyValue>,
    body: MessageBody,
}

impl Message {
    /// Creates a message with the given body and default headers.
    #[must_use]
    pub fn new(body: MessageBody) -> Self {
        Self {
            id: MessageId::new(),
            headers: MessageHeaders::default(),
            properties: BTreeMap::new(),
            body,
        }
    }

    /// Creates a header-only message.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(MessageBody::Empty)
    }

    /// Creates a text message.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(MessageBody::Text(text.into()))
    }

    /// Creates a map message.
    #[must_use]
    pub fn map(entries: BTreeMap<String, PropertyValue>) -> Self {
        Self::new(MessageBody::Map(entries))
    }

    /// Creates a bytes message.
    #[must_use]
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(MessageBody::Bytes(bytes.into()))
    }

    /// Creates an object message.
    #[must_use]
    pub fn object(payload: ObjectPayload) -> Self {
        Self::new(MessageBody::Object(payload))
    }

    /// Creates a stream message.
    #[must_use]
    pub fn stream(values: Vec<PropertyValue>) -> Self {
        Self::new(MessageBody::Stream(values))
    }

    /// Adds an application property, replacing any existing value.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Sets the correlation identifier.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.headers.correlation_id = Some(correlation_id.into());
        self
    }

    /// Sets the delivery parameters.
    #[must_use]
    pub fn with_send_options(mut self, options: SendOptions) -> Self {
        self.headers.delivery_mode = options.delivery_mode;
        self.headers.priority = options.priority;
        self.headers.expiration = options.expiration;
        self
    }

    /// Returns the message identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the body.
    #[must_use]
    pub const fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Returns the body kind.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    /// Returns the headers.
    #[must_use]
    pub const fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    /// Returns the headers for mutation.
    pub const fn headers_mut(&mut self) -> &mut MessageHeaders {
        &mut self.headers
    }

    /// Returns all application properties.
    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    /// Returns a single application property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Returns an integer property.
    #[must_use]
    pub fn int_property(&self, name: &str) -> Option<i64> {
        self.property(name).and_then(PropertyValue::as_i64)
    }

    /// Returns a string property.
    #[must_use]
    pub fn string_property(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(PropertyValue::as_str)
    }

    /// Sets an application property. The last write for a name wins.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Copies headers and application properties from `source`.
    ///
    /// The body and identifier of `self` are left untouched. Transformers use
    /// this to carry routing metadata onto a newly built output message.
    pub fn copy_headers_from(&mut self, source: &Self) {
        self.headers.correlation_id.clone_from(&source.headers.correlation_id);
        self.headers.reply_to.clone_from(&source.headers.reply_to);
        self.headers.message_type.clone_from(&source.headers.message_type);
        self.headers.delivery_mode = source.headers.delivery_mode;
        self.headers.priority = source.headers.priority;
        self.headers.expiration = source.headers.expiration;
        for (name, value) in &source.properties {
            self.properties.insert(name.clone(), value.clone());
        }
    }

    /// Returns the text body.
    ///
    /// # Errors
    ///
    /// Returns [`UnexpectedBodyKind`] when the body is not text.
    pub fn expect_text(&self) -> Result<&str, UnexpectedBodyKind> {
        match &self.body {
            MessageBody::Text(text) => Ok(text),
            other => Err(self.mismatch(MessageKind::Text, other)),
        }
    }

    /// Returns the map body.
    ///
    /// # Errors
    ///
    /// Returns [`UnexpectedBodyKind`] when the body is not a map.
    pub fn expect_map(&self) -> Result<&BTreeMap<String, PropertyValue>, UnexpectedBodyKind> {
        match &self.body {
            MessageBody::Map(entries) => Ok(entries),
            other => Err(self.mismatch(MessageKind::Map, other)),
        }
    }

    /// Returns the bytes body.
    ///
    /// # Errors
    ///
    /// Returns [`UnexpectedBodyKind`] when the body is not bytes.
    pub fn expect_bytes(&self) -> Result<&[u8], UnexpectedBodyKind> {
        match &self.body {
            MessageBody::Bytes(bytes) => Ok(bytes),
            other => Err(self.mismatch(MessageKind::Bytes, other)),
        }
    }

    /// Returns the object body.
    ///
    /// # Errors
    ///
    /// Returns [`UnexpectedBodyKind`] when the body is not an object.
    pub fn expect_object(&self) -> Result<&ObjectPayload, UnexpectedBodyKind> {
        match &self.body {
            MessageBody::Object(payload) => Ok(payload),
            other => Err(self.mismatch(MessageKind::Object, other)),
        }
    }

    /// Returns whether the time-to-live has elapsed at `now`.
    ///
    /// Messages without a send timestamp or without a time-to-live never
    /// expire.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let (Some(sent_at), Some(ttl)) = (self.headers.timestamp, self.headers.expiration) else {
            return false;
        };
        TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| sent_at.checked_add_signed(delta))
            .is_some_and(|expires_at| expires_at <= now)
    }

    const fn mismatch(&self, expected: MessageKind, actual: &MessageBody) -> UnexpectedBodyKind {
        UnexpectedBodyKind {
            message_id: self.id,
            expected,
            actual: actual.kind(),
        }
    }
}
