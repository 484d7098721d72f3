//! Inbound Message Model
//!
//! An [`InboundMessage`] is the decoded form of one event pulled from the
//! source: topic, headers, and a [`MessageBody`] classified by shape.
//! Field matching and templating are only defined for object bodies;
//! everything else falls through to plain-text handling.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::source::SourceMessage;

/// A message body, classified once at decode time.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// Payload parsed as a JSON object
    Object(Map<String, Value>),
    /// Payload parsed as a JSON array
    Array(Vec<Value>),
    /// Payload parsed as a JSON scalar (string, number, bool, null)
    Scalar(Value),
    /// Payload that is not valid JSON; undecodable bytes are replaced
    /// during lossy UTF-8 decoding
    Text(String),
}

impl MessageBody {
    /// Decode a raw payload. Never fails: invalid JSON becomes [`MessageBody::Text`],
    /// invalid UTF-8 is decoded lossily first.
    pub fn decode(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => MessageBody::Object(map),
            Ok(Value::Array(items)) => MessageBody::Array(items),
            Ok(value) => MessageBody::Scalar(value),
            Err(_) => MessageBody::Text(text.into_owned()),
        }
    }

    /// The parsed object, if the body is one.
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            MessageBody::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Whether the body parsed as a JSON object.
    pub fn is_object(&self) -> bool {
        matches!(self, MessageBody::Object(_))
    }

    /// Default outbound rendering: pretty-printed JSON for structured
    /// bodies, the decoded text otherwise. Scalar strings render bare.
    pub fn render(&self) -> String {
        match self {
            MessageBody::Object(map) => format!("{:#}", Value::Object(map.clone())),
            MessageBody::Array(items) => format!("{:#}", Value::Array(items.clone())),
            MessageBody::Scalar(Value::String(s)) => s.clone(),
            MessageBody::Scalar(value) => value.to_string(),
            MessageBody::Text(text) => text.clone(),
        }
    }
}

/// One decoded inbound message, alive for a single poll cycle.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Topic the message arrived on
    pub topic: String,
    /// Message headers; a header may be present without a value
    pub headers: HashMap<String, Option<String>>,
    /// Decoded body
    pub body: MessageBody,
}

impl InboundMessage {
    /// Decode a raw source message.
    pub fn decode(message: SourceMessage) -> Self {
        let body = MessageBody::decode(&message.payload);
        Self {
            topic: message.topic,
            headers: message.headers,
            body,
        }
    }
}
