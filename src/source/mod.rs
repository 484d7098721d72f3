//! Inbound Event Source
//!
//! The bridge consumes messages through the [`EventSource`] trait so the
//! loop never depends on broker specifics. Offset and commit semantics
//! belong entirely to the source implementation; the bridge neither
//! commits nor requests commits.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

mod kafka;

pub use kafka::KafkaSource;

/// One raw event pulled from the inbound stream.
#[derive(Debug, Clone)]
pub struct SourceMessage {
    /// Topic the event arrived on
    pub topic: String,
    /// Headers; a header may carry no value
    pub headers: HashMap<String, Option<String>>,
    /// Raw payload bytes
    pub payload: Bytes,
}

/// Errors surfaced by an event source.
#[derive(Debug)]
pub enum SourceError {
    /// Broker-level consume error; the loop logs it and keeps polling
    Consume(String),
    /// Unrecoverable error; propagates out of the loop and terminates
    /// the process
    Fatal(String),
}

impl SourceError {
    /// Whether this error should terminate the bridge loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::Fatal(_))
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Consume(e) => write!(f, "consume error: {}", e),
            SourceError::Fatal(e) => write!(f, "fatal source error: {}", e),
        }
    }
}

impl std::error::Error for SourceError {}

/// An inbound stream of topic-scoped events.
///
/// `poll` returning `Ok(None)` means nothing new: a poll timeout or a
/// benign end-of-partition signal, never an error.
#[async_trait]
pub trait EventSource: Send {
    /// Wait up to `timeout` for the next message.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<SourceMessage>, SourceError>;

    /// Release the underlying consumer.
    fn close(&mut self);
}
