//! Route Matching
//!
//! [`RouteTable`] holds the ordered, immutable route definitions and
//! selects the destination for each inbound message. Routes are tried in
//! declaration order and the first satisfying route wins; there is no
//! "most specific" resolution.
//!
//! A route matches when all three tests pass:
//! 1. Topic: prefix match for wildcard patterns, equality otherwise
//! 2. Headers: every configured pair present with an exactly equal value
//! 3. Fields: body is a JSON object and every configured key has an
//!    exactly equal parsed value

use std::collections::HashMap;

use serde_json::Value;

use crate::config::{RouteConfig, TOPIC_WILDCARD};
use crate::message::{InboundMessage, MessageBody};

/// Ordered, immutable route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteConfig>,
}

impl RouteTable {
    /// Build a table from declaration-ordered route definitions.
    pub fn new(routes: Vec<RouteConfig>) -> Self {
        Self { routes }
    }

    /// Number of routes in the table.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// All routes, in declaration order.
    pub fn routes(&self) -> &[RouteConfig] {
        &self.routes
    }

    /// Select the first route the message satisfies, scanning in
    /// declaration order. `None` means the message is dropped.
    pub fn select(&self, message: &InboundMessage) -> Option<&RouteConfig> {
        self.routes
            .iter()
            .find(|route| route_matches(route, &message.topic, &message.headers, &message.body))
    }

    /// Topics to subscribe to, derived from the route patterns with
    /// wildcard markers stripped. Deduplicated, declaration order kept.
    pub fn subscribe_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();
        for route in &self.routes {
            let topic = route.subscribe_topic();
            if !topic.is_empty() && !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        topics
    }
}

/// Whether a message satisfies a single route's conditions.
pub fn route_matches(
    route: &RouteConfig,
    topic: &str,
    headers: &HashMap<String, Option<String>>,
    body: &MessageBody,
) -> bool {
    if !topic_matches(&route.topic_pattern, topic) {
        return false;
    }

    if let Some(required) = route.header_constraints() {
        if !headers_match(required, headers) {
            return false;
        }
    }

    if let Some(required) = route.field_constraints() {
        if !fields_match(required, body) {
            return false;
        }
    }

    true
}

/// Topic test: wildcard patterns match by literal prefix (marker
/// stripped), exact patterns by string equality.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    if pattern.contains(TOPIC_WILDCARD) {
        let prefix = pattern.replace(TOPIC_WILDCARD, "");
        topic.starts_with(&prefix)
    } else {
        topic == pattern
    }
}

/// Header test: every required header must be present with an exactly
/// equal value. A missing header or a header without a value fails.
fn headers_match(
    required: &HashMap<String, String>,
    headers: &HashMap<String, Option<String>>,
) -> bool {
    required
        .iter()
        .all(|(name, want)| matches!(headers.get(name), Some(Some(value)) if value == want))
}

/// Field test: only object bodies can satisfy field constraints, and
/// values are compared as parsed JSON values. A configured string never
/// equals a numeric field.
fn fields_match(required: &HashMap<String, Value>, body: &MessageBody) -> bool {
    let Some(object) = body.as_object() else {
        return false;
    };
    required
        .iter()
        .all(|(name, want)| object.get(name) == Some(want))
}
