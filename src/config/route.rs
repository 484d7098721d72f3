//! Route Configuration
//!
//! Configuration structures for the ordered route table. Routes are
//! declaration-ordered and immutable for the process lifetime.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// Wildcard marker used in topic patterns for prefix matching.
pub const TOPIC_WILDCARD: char = '*';

/// A single routing rule: a matching predicate paired with a destination
/// and an optional transform.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RouteConfig {
    /// Route name, used only for logging and diagnostics
    #[serde(default)]
    pub name: String,

    /// Topic to match: exact name, or a prefix pattern ending in `*`
    pub topic_pattern: String,

    /// Identifier of the downstream agent endpoint; a route with an
    /// empty destination is never actionable even when it matches
    #[serde(default, alias = "prompt_id")]
    pub destination_id: String,

    /// Required header values; every pair must hold for the route to match
    #[serde(default)]
    pub header_match: Option<HashMap<String, String>>,

    /// Required JSON field values; only object bodies can satisfy these,
    /// and values are compared as parsed JSON values
    #[serde(default)]
    pub field_match: Option<HashMap<String, Value>>,

    /// Optional outbound template with `{field}` placeholders
    #[serde(default)]
    pub transform_template: Option<String>,
}

impl RouteConfig {
    /// Whether the topic pattern matches by prefix rather than equality.
    pub fn is_wildcard(&self) -> bool {
        self.topic_pattern.contains(TOPIC_WILDCARD)
    }

    /// The topic to subscribe to for this route: the pattern with
    /// wildcard markers stripped.
    pub fn subscribe_topic(&self) -> String {
        self.topic_pattern.replace(TOPIC_WILDCARD, "")
    }

    /// Header constraints, `None` when absent or empty.
    pub fn header_constraints(&self) -> Option<&HashMap<String, String>> {
        self.header_match.as_ref().filter(|m| !m.is_empty())
    }

    /// Field constraints, `None` when absent or empty.
    pub fn field_constraints(&self) -> Option<&HashMap<String, Value>> {
        self.field_match.as_ref().filter(|m| !m.is_empty())
    }
}
