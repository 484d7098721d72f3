//! Bridge Loop
//!
//! Pulls one message at a time from the inbound source and runs the
//! match -> transform -> deliver-with-retry pipeline to completion
//! before the next poll. Processing is strictly sequential by design: a
//! slow destination head-of-line-blocks the whole inbound stream, and
//! that trade-off must be preserved.
//!
//! Lifecycle: `Init -> Running -> Stopping -> Stopped`. The stop flag is
//! observed only at the top of the loop, between a completed delivery
//! cycle and the next poll; an in-flight delivery is never interrupted.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::delivery::{DeliveryClient, Outcome, RetryPolicy};
use crate::message::InboundMessage;
use crate::route::RouteTable;
use crate::source::{EventSource, SourceError, SourceMessage};

#[cfg(test)]
mod tests;

/// Lifecycle state of the bridge loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Constructed, not yet running
    Init,
    /// Polling and processing messages
    Running,
    /// Stop observed, releasing the source
    Stopping,
    /// Source released, loop exited
    Stopped,
}

/// Requests a cooperative stop of a running bridge.
///
/// The request takes effect at the top of the loop; worst-case latency
/// is one poll timeout plus one full delivery cycle with all retries.
#[derive(Clone)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Signal the bridge to stop after the current cycle.
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// The bridge service: one source, one route table, one delivery client.
pub struct Bridge {
    routes: RouteTable,
    source: Box<dyn EventSource>,
    client: Arc<dyn DeliveryClient>,
    retry: RetryPolicy,
    poll_timeout: Duration,
    state: BridgeState,
    stop_rx: watch::Receiver<bool>,
}

impl Bridge {
    /// Build a bridge from configuration and its two collaborators.
    /// Returns the bridge and the handle that stops it.
    pub fn new(
        config: &Config,
        source: Box<dyn EventSource>,
        client: Arc<dyn DeliveryClient>,
    ) -> (Self, StopHandle) {
        let (tx, rx) = watch::channel(false);

        let bridge = Self {
            routes: RouteTable::new(config.route.clone()),
            source,
            client,
            retry: RetryPolicy {
                max_retries: config.bridge.max_retries,
                retry_delay: config.bridge.retry_delay,
            },
            poll_timeout: config.bridge.poll_timeout,
            state: BridgeState::Init,
            stop_rx: rx,
        };

        (bridge, StopHandle { tx })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Run the loop until stopped or a fatal source error.
    ///
    /// Non-fatal source errors are logged and polling continues; a fatal
    /// error releases the source and propagates to the caller.
    pub async fn run(&mut self) -> Result<(), SourceError> {
        self.state = BridgeState::Running;
        info!(
            "Bridge started ({} routes), consuming messages...",
            self.routes.len()
        );

        while self.state == BridgeState::Running {
            // The only point where a stop request is honored
            if *self.stop_rx.borrow() {
                break;
            }

            match self.source.poll(self.poll_timeout).await {
                // Timeout or benign end-of-partition
                Ok(None) => continue,
                Ok(Some(message)) => self.process(message).await,
                Err(e) if e.is_fatal() => {
                    error!("Fatal source error: {}", e);
                    self.shutdown();
                    return Err(e);
                }
                Err(e) => {
                    error!("Source error: {}", e);
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    fn shutdown(&mut self) {
        self.state = BridgeState::Stopping;
        info!("Stopping bridge");
        self.source.close();
        self.state = BridgeState::Stopped;
        info!("Bridge stopped");
    }

    /// Process one message to completion: decode, select, transform,
    /// deliver with retries. Malformed payloads never crash the loop.
    async fn process(&self, message: SourceMessage) {
        let message = InboundMessage::decode(message);

        let Some(route) = self.routes.select(&message) else {
            warn!(
                "No matching route for topic '{}', skipping message",
                message.topic
            );
            return;
        };

        if route.destination_id.is_empty() {
            error!(
                "Route '{}' has no destination configured, skipping message",
                route.name
            );
            return;
        }

        let text = crate::transform::transform(route, &message.body);
        let metadata = json!({
            "source": "kafka",
            "topic": message.topic,
            "route": route.name,
        });

        let outcome = self
            .retry
            .deliver(self.client.as_ref(), route, &text, Some(metadata))
            .await;

        match outcome {
            Outcome::Delivered { attempts, .. } => {
                debug!(
                    "Delivered message from topic '{}' via route '{}' ({} attempt(s))",
                    message.topic, route.name, attempts
                );
            }
            Outcome::ApplicationError { .. } => {
                // Terminal for this message; already logged by the policy
            }
            Outcome::Dropped { attempts } => {
                warn!(
                    "Dropped message from topic '{}' after {} attempt(s)",
                    message.topic, attempts
                );
            }
        }
    }
}
