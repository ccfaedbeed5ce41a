//! Message envelope shared by the work queue and the event topic.
//!
//! Queues and topics move opaque text bodies plus string attributes, the same
//! shape most brokers expose. Payload types encode themselves to JSON through
//! the [`Payload`] trait and are decoded back on the consuming side.
//!
//! # Example
//!
//! ```
//! use order_pipeline_core::message::{Message, Payload};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Ping {
//!     id: u32,
//! }
//!
//! impl Payload for Ping {
//!     fn kind(&self) -> &'static str {
//!         "PING"
//!     }
//! }
//!
//! let message = Ping { id: 7 }.to_message("msg-1".to_string()).unwrap();
//! assert_eq!(message.attribute(Message::KIND_ATTRIBUTE), Some("PING"));
//! assert_eq!(message.decode::<Ping>().unwrap(), Ping { id: 7 });
//! ```

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// String attributes attached to a message (routing and classification tags).
pub type MessageAttributes = BTreeMap<String, String>;

/// Error types for message encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Failed to encode a payload to JSON.
    #[error("Failed to encode message body: {0}")]
    Encode(String),

    /// Failed to decode a message body.
    #[error("Failed to decode message body: {0}")]
    Decode(String),
}

/// A payload that travels inside a [`Message`].
///
/// The `kind()` tag is copied into the message attributes so consumers can
/// route without parsing the body.
pub trait Payload: Serialize + Send + Sync {
    /// Stable type tag for this payload (e.g., `"ORDER_CONFIRMED"`).
    fn kind(&self) -> &'static str;

    /// Serialize this payload to a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `MessageError::Encode` if the payload cannot be serialized.
    fn to_body(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(|e| MessageError::Encode(e.to_string()))
    }

    /// Wrap this payload in a message with the kind attribute set.
    ///
    /// # Errors
    ///
    /// Returns `MessageError::Encode` if the payload cannot be serialized.
    fn to_message(&self, message_id: String) -> Result<Message, MessageError> {
        Ok(Message::new(message_id, self.to_body()?).with_attribute(Message::KIND_ATTRIBUTE, self.kind()))
    }
}

/// A transport message: id, optional subject, text body and attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Transport-assigned identifier, used for per-item acknowledgment.
    pub message_id: String,

    /// Human-readable subject line (topics only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Message body, normally JSON.
    pub body: String,

    /// Routing and classification attributes.
    #[serde(default)]
    pub attributes: MessageAttributes,
}

impl Message {
    /// Attribute carrying the payload kind.
    pub const KIND_ATTRIBUTE: &'static str = "kind";

    /// Create a new message with no subject or attributes.
    #[must_use]
    pub fn new(message_id: String, body: String) -> Self {
        Self {
            message_id,
            subject: None,
            body,
            attributes: MessageAttributes::new(),
        }
    }

    /// Set the subject line.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Add or replace an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up an attribute value.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Decode the JSON body into a payload type.
    ///
    /// # Errors
    ///
    /// Returns `MessageError::Decode` if the body is not valid JSON for `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, MessageError> {
        serde_json::from_str(&self.body).map_err(|e| MessageError::Decode(e.to_string()))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message {{ id: {}, kind: {}, size: {} bytes }}",
            self.message_id,
            self.attribute(Self::KIND_ATTRIBUTE).unwrap_or("-"),
            self.body.len()
        )
    }
}
