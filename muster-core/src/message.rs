//! Message envelope carried by the message bus.

use crate::{JsonMap, MessageId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// MESSAGE TYPE
// ============================================================================

/// Type of message on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Request expecting a response
    Request,
    /// Response to a prior request
    Response,
    /// Lifecycle event notification
    Event,
    /// Imperative command
    Command,
}

impl MessageType {
    /// Convert to the wire string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Request => "request",
            MessageType::Response => "response",
            MessageType::Event => "event",
            MessageType::Command => "command",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = MessageTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "request" => Ok(MessageType::Request),
            "response" => Ok(MessageType::Response),
            "event" => Ok(MessageType::Event),
            "command" => Ok(MessageType::Command),
            _ => Err(MessageTypeParseError(s.to_string())),
        }
    }
}

/// Error when parsing an invalid message type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTypeParseError(pub String);

impl fmt::Display for MessageTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid message type: {}", self.0)
    }
}

impl std::error::Error for MessageTypeParseError {}

// ============================================================================
// MESSAGE ENVELOPE
// ============================================================================

/// Standard message envelope.
///
/// Immutable after construction; ids use UUIDv7 and are never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Globally unique message id
    pub id: MessageId,
    /// Message kind discriminator
    pub message_type: MessageType,
    /// Sender identifier (opaque string)
    pub source: String,
    /// Recipient identifier (opaque string)
    pub destination: String,
    /// Message body
    pub payload: Value,
    /// Id of the message this one correlates with (request/response pairing)
    pub correlation_id: Option<MessageId>,
    /// When the message was constructed
    pub timestamp: Timestamp,
    /// Arbitrary transport headers
    pub headers: JsonMap,
}

impl Message {
    /// Create a new message.
    pub fn new(
        message_type: MessageType,
        source: impl Into<String>,
        destination: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            message_type,
            source: source.into(),
            destination: destination.into(),
            payload,
            correlation_id: None,
            timestamp: Utc::now(),
            headers: JsonMap::new(),
        }
    }

    /// Create an EVENT message.
    pub fn event(
        source: impl Into<String>,
        destination: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self::new(MessageType::Event, source, destination, payload)
    }

    /// Create a REQUEST message.
    pub fn request(
        source: impl Into<String>,
        destination: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self::new(MessageType::Request, source, destination, payload)
    }

    /// Create a RESPONSE message correlated with a request.
    pub fn response(request: &Message, source: impl Into<String>, payload: Value) -> Self {
        Self::new(MessageType::Response, source, request.source.clone(), payload)
            .with_correlation(request.id)
    }

    /// Create a COMMAND message.
    pub fn command(
        source: impl Into<String>,
        destination: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self::new(MessageType::Command, source, destination, payload)
    }

    /// Set the correlation id.
    pub fn with_correlation(mut self, correlation_id: MessageId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Attach a header.
    pub fn with_header(mut self, key: impl Into<String>, value: Value) -> Self {
        self.headers.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_type_round_trip() {
        for mt in [
            MessageType::Request,
            MessageType::Response,
            MessageType::Event,
            MessageType::Command,
        ] {
            let parsed: MessageType = mt.as_str().parse().unwrap();
            assert_eq!(parsed, mt);
        }
        assert!("broadcast".parse::<MessageType>().is_err());
    }

    #[test]
    fn test_message_ids_unique() {
        let a = Message::event("orchestrator", "worker-1", json!({}));
        let b = Message::event("orchestrator", "worker-1", json!({}));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_response_correlates_with_request() {
        let req = Message::request("caller", "worker-1", json!({"q": 1}));
        let resp = Message::response(&req, "worker-1", json!({"a": 2}));

        assert_eq!(resp.message_type, MessageType::Response);
        assert_eq!(resp.destination, "caller");
        assert_eq!(resp.correlation_id, Some(req.id));
    }

    #[test]
    fn test_message_headers() {
        let msg = Message::event("a", "b", json!(null)).with_header("retry", json!(3));
        assert_eq!(msg.headers.get("retry"), Some(&json!(3)));
    }
}
