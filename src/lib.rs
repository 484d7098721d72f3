//! AgentBridge - Kafka to agent-endpoint routing bridge
//!
//! Consumes topic-scoped event messages from Kafka and routes each one
//! to a downstream agent endpoint, selecting the destination from an
//! ordered rule table, optionally rewriting the body through a template,
//! and delivering over a synchronous request/response call with bounded
//! fixed-delay retry.

pub mod bridge;
pub mod config;
pub mod delivery;
pub mod message;
pub mod route;
pub mod source;
pub mod transform;

pub use bridge::{Bridge, BridgeState, StopHandle};
pub use config::{Config, ConfigError, RouteConfig};
pub use delivery::{AgentClient, DeliveryClient, DeliveryError, Outcome, RetryPolicy};
pub use message::{InboundMessage, MessageBody};
pub use route::RouteTable;
pub use source::{EventSource, KafkaSource, SourceError, SourceMessage};
