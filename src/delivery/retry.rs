//! Retried Delivery
//!
//! Bounded fixed-delay retry around a single delivery attempt. The
//! delay is applied strictly between attempts: never before the first,
//! never after the last. There is no backoff and no jitter.

use std::time::Duration;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::RouteConfig;

use super::{reply_text, truncate_reply, DeliveryClient};

/// Result of a retried delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The destination accepted the message
    Delivered {
        /// Attempts used, including the successful one
        attempts: u32,
        /// Reply text extracted from the response
        reply: String,
    },
    /// The destination reported an error; terminal, never retried
    ApplicationError {
        /// Attempts used (always the attempt that got the response)
        attempts: u32,
        /// The reported error value
        error: Value,
    },
    /// Every allowed transport attempt failed; the message is dropped
    Dropped {
        /// Attempts used
        attempts: u32,
    },
}

/// Fixed-delay retry policy for agent delivery.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum delivery attempts per message
    pub max_retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Deliver `text` to the route's destination, retrying transport
    /// failures up to the attempt bound. Application errors return
    /// immediately even when attempts remain.
    pub async fn deliver(
        &self,
        client: &dyn DeliveryClient,
        route: &RouteConfig,
        text: &str,
        metadata: Option<Value>,
    ) -> Outcome {
        let allowed = self.max_retries.max(1);

        for attempt in 1..=allowed {
            info!(
                "Routing message to destination '{}' (route '{}', attempt {}/{})",
                route.destination_id, route.name, attempt, allowed
            );

            match client
                .send(&route.destination_id, text, metadata.clone())
                .await
            {
                Ok(response) => {
                    if let Some(err) = response.get("error") {
                        error!(
                            "Destination '{}' returned error: {}",
                            route.destination_id, err
                        );
                        return Outcome::ApplicationError {
                            attempts: attempt,
                            error: err.clone(),
                        };
                    }

                    let reply = reply_text(&response);
                    info!("Agent response: {}", truncate_reply(reply));
                    return Outcome::Delivered {
                        attempts: attempt,
                        reply: reply.to_string(),
                    };
                }
                Err(e) => {
                    warn!(
                        "Failed to deliver for route '{}' (attempt {}/{}): {}",
                        route.name, attempt, allowed, e
                    );
                    if attempt < allowed {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        error!(
            "Max retries exceeded for route '{}' -> '{}', dropping message",
            route.name, route.destination_id
        );
        Outcome::Dropped { attempts: allowed }
    }
}
