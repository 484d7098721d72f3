//! Agent Delivery
//!
//! Outbound side of the bridge: a [`DeliveryClient`] sends one text
//! payload to a named destination and returns the raw response value;
//! [`RetryPolicy`] wraps a send in the bounded fixed-delay retry policy
//! and classifies the outcome.
//!
//! A transport-level failure (connect, timeout, non-success status,
//! unparseable body) is retryable. A response that carries an `error`
//! field is an application error: terminal for the message, never
//! retried.

use async_trait::async_trait;
use serde_json::Value;

mod agent;
mod retry;

pub use agent::AgentClient;
pub use retry::{Outcome, RetryPolicy};

/// Longest reply prefix echoed into the log.
pub const REPLY_LOG_LIMIT: usize = 200;

/// Transport-level delivery failure; always retryable.
#[derive(Debug)]
pub enum DeliveryError {
    /// Connection, timeout, or non-success HTTP status
    Transport(String),
    /// The response body could not be parsed as JSON
    InvalidResponse(String),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Transport(e) => write!(f, "transport error: {}", e),
            DeliveryError::InvalidResponse(e) => write!(f, "invalid response: {}", e),
        }
    }
}

impl std::error::Error for DeliveryError {}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        DeliveryError::Transport(e.to_string())
    }
}

/// Synchronous request/response delivery to a named destination.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Send `text` to `destination_id`, returning the raw response value
    /// on transport success.
    async fn send(
        &self,
        destination_id: &str,
        text: &str,
        metadata: Option<Value>,
    ) -> Result<Value, DeliveryError>;
}

/// Extract the agent's reply text from a response, tolerating absence.
pub fn reply_text(response: &Value) -> &str {
    response
        .get("result")
        .and_then(|result| result.get("parts"))
        .and_then(|parts| parts.get(0))
        .and_then(|part| part.get("text"))
        .and_then(Value::as_str)
        .unwrap_or("No response")
}

/// Truncate a reply to [`REPLY_LOG_LIMIT`] bytes on a char boundary.
pub fn truncate_reply(text: &str) -> &str {
    let mut end = REPLY_LOG_LIMIT.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_text_present() {
        let response = json!({"result": {"parts": [{"kind": "text", "text": "hello"}]}});
        assert_eq!(reply_text(&response), "hello");
    }

    #[test]
    fn test_reply_text_absent() {
        assert_eq!(reply_text(&json!({})), "No response");
        assert_eq!(reply_text(&json!({"result": {}})), "No response");
        assert_eq!(reply_text(&json!({"result": {"parts": []}})), "No response");
        assert_eq!(
            reply_text(&json!({"result": {"parts": [{"kind": "text"}]}})),
            "No response"
        );
    }

    #[test]
    fn test_truncate_reply_short() {
        assert_eq!(truncate_reply("short"), "short");
    }

    #[test]
    fn test_truncate_reply_long() {
        let long = "x".repeat(REPLY_LOG_LIMIT + 50);
        assert_eq!(truncate_reply(&long).len(), REPLY_LOG_LIMIT);
    }

    #[test]
    fn test_truncate_reply_respects_char_boundary() {
        // A multi-byte char straddling the limit must not be split.
        let mut text = "a".repeat(REPLY_LOG_LIMIT - 1);
        text.push('é'); // two bytes, crosses the limit
        let truncated = truncate_reply(&text);
        assert_eq!(truncated.len(), REPLY_LOG_LIMIT - 1);
        assert!(truncated.chars().all(|c| c == 'a'));
    }
}
