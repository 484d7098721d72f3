//! Bridge Loop Tests
//!
//! Drive the loop with an in-memory source and a recording delivery
//! client; no broker or network involved.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::{Config, RouteConfig};
use crate::delivery::{DeliveryClient, DeliveryError};
use crate::source::{EventSource, SourceError, SourceMessage};

use super::*;

// =============================================================================
// Fakes
// =============================================================================

/// Source fed from a queue; stops the bridge once drained.
struct QueueSource {
    events: VecDeque<Result<Option<SourceMessage>, SourceError>>,
    stop: Arc<Mutex<Option<StopHandle>>>,
    closed: Arc<Mutex<bool>>,
}

#[async_trait]
impl EventSource for QueueSource {
    async fn poll(
        &mut self,
        _timeout: Duration,
    ) -> Result<Option<SourceMessage>, SourceError> {
        match self.events.pop_front() {
            Some(event) => event,
            None => {
                if let Some(handle) = self.stop.lock().unwrap().as_ref() {
                    handle.stop();
                }
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        *self.closed.lock().unwrap() = true;
    }
}

/// Records every send; replies from a script, or success by default.
struct RecordingClient {
    calls: Mutex<Vec<(String, String, Option<Value>)>>,
    script: Mutex<VecDeque<Result<Value, ()>>>,
}

impl RecordingClient {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
        }
    }

    fn with_script(script: Vec<Result<Value, ()>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(script.into()),
        }
    }

    fn calls(&self) -> Vec<(String, String, Option<Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryClient for RecordingClient {
    async fn send(
        &self,
        destination_id: &str,
        text: &str,
        metadata: Option<Value>,
    ) -> Result<Value, DeliveryError> {
        self.calls.lock().unwrap().push((
            destination_id.to_string(),
            text.to_string(),
            metadata,
        ));
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(())) => Err(DeliveryError::Transport("refused".to_string())),
            None => Ok(json!({"result": {"parts": [{"kind": "text", "text": "ok"}]}})),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn event(topic: &str, headers: &[(&str, &str)], payload: &[u8]) -> SourceMessage {
    SourceMessage {
        topic: topic.to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect(),
        payload: bytes::Bytes::copy_from_slice(payload),
    }
}

fn config(routes: Vec<RouteConfig>) -> Config {
    let mut config = Config::default();
    config.agent.token = "test".to_string();
    config.bridge.retry_delay = Duration::from_millis(1);
    config.route = routes;
    config
}

fn route(name: &str, pattern: &str, destination: &str) -> RouteConfig {
    RouteConfig {
        name: name.to_string(),
        topic_pattern: pattern.to_string(),
        destination_id: destination.to_string(),
        ..Default::default()
    }
}

/// Run the bridge over the given events until the source drains.
async fn run_bridge(
    routes: Vec<RouteConfig>,
    events: Vec<Result<Option<SourceMessage>, SourceError>>,
    client: Arc<RecordingClient>,
) -> (Result<(), SourceError>, BridgeState, bool) {
    let stop = Arc::new(Mutex::new(None));
    let closed = Arc::new(Mutex::new(false));
    let source = QueueSource {
        events: events.into(),
        stop: stop.clone(),
        closed: closed.clone(),
    };

    let (mut bridge, handle) = Bridge::new(&config(routes), Box::new(source), client);
    *stop.lock().unwrap() = Some(handle);

    let result = bridge.run().await;
    let state = bridge.state();
    let closed = *closed.lock().unwrap();
    (result, state, closed)
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_clean_stop_releases_source() {
    let client = Arc::new(RecordingClient::new());
    let (result, state, closed) =
        run_bridge(vec![route("r", "t", "d")], vec![], client).await;

    assert!(result.is_ok());
    assert_eq!(state, BridgeState::Stopped);
    assert!(closed);
}

#[tokio::test]
async fn test_initial_state_is_init() {
    let client: Arc<dyn DeliveryClient> = Arc::new(RecordingClient::new());
    let source = QueueSource {
        events: VecDeque::new(),
        stop: Arc::new(Mutex::new(None)),
        closed: Arc::new(Mutex::new(false)),
    };
    let (bridge, _handle) = Bridge::new(&config(vec![]), Box::new(source), client);
    assert_eq!(bridge.state(), BridgeState::Init);
}

#[tokio::test]
async fn test_nonfatal_source_error_continues() {
    let client = Arc::new(RecordingClient::new());
    let events = vec![
        Err(SourceError::Consume("broker hiccup".to_string())),
        Ok(Some(event("t", &[], b"{}"))),
    ];
    let (result, _, _) = run_bridge(vec![route("r", "t", "d")], events, client.clone()).await;

    assert!(result.is_ok());
    // The message after the error was still processed
    assert_eq!(client.calls().len(), 1);
}

#[tokio::test]
async fn test_fatal_source_error_propagates() {
    let client = Arc::new(RecordingClient::new());
    let events = vec![
        Err(SourceError::Fatal("broker gone".to_string())),
        Ok(Some(event("t", &[], b"{}"))),
    ];
    let (result, state, closed) =
        run_bridge(vec![route("r", "t", "d")], events, client.clone()).await;

    assert!(matches!(result, Err(SourceError::Fatal(_))));
    assert_eq!(state, BridgeState::Stopped);
    assert!(closed);
    // Nothing past the fatal error is processed
    assert!(client.calls().is_empty());
}

// =============================================================================
// Processing
// =============================================================================

#[tokio::test]
async fn test_unmatched_topic_makes_no_delivery_call() {
    let client = Arc::new(RecordingClient::new());
    let events = vec![Ok(Some(event("unknown.topic", &[], b"{}")))];
    run_bridge(vec![route("orders", "orders.events", "d")], events, client.clone()).await;

    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_empty_destination_drops_without_call() {
    let client = Arc::new(RecordingClient::new());
    let events = vec![Ok(Some(event("t", &[], b"{}")))];
    run_bridge(vec![route("misconfigured", "t", "")], events, client.clone()).await;

    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_header_matched_route_delivers_rendered_body() {
    let client = Arc::new(RecordingClient::new());
    let mut support = route("customer-support", "customer.events", "dest-support");
    support.header_match = Some(
        [("event_type".to_string(), "support_request".to_string())]
            .into_iter()
            .collect(),
    );

    let events = vec![Ok(Some(event(
        "customer.events",
        &[("event_type", "support_request")],
        br#"{"customer_id": "CUST-1"}"#,
    )))];
    run_bridge(vec![support], events, client.clone()).await;

    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    let (destination, text, metadata) = &calls[0];
    assert_eq!(destination, "dest-support");
    assert!(text.contains("\"customer_id\": \"CUST-1\""));
    let metadata = metadata.as_ref().unwrap();
    assert_eq!(metadata["source"], "kafka");
    assert_eq!(metadata["topic"], "customer.events");
    assert_eq!(metadata["route"], "customer-support");
}

#[tokio::test]
async fn test_wildcard_route_catches_prefixed_topics() {
    let client = Arc::new(RecordingClient::new());
    let events = vec![
        Ok(Some(event("analytics.events", &[], br#"{"n": 1}"#))),
        Ok(Some(event("analytics.x", &[], br#"{"n": 2}"#))),
        Ok(Some(event("analytic.events", &[], br#"{"n": 3}"#))),
    ];
    run_bridge(
        vec![route("analytics", "analytics.*", "dest-analytics")],
        events,
        client.clone(),
    )
    .await;

    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(d, _, _)| d == "dest-analytics"));
}

#[tokio::test]
async fn test_template_applied_before_delivery() {
    let client = Arc::new(RecordingClient::new());
    let mut metrics = route("metrics", "metrics.events", "dest-metrics");
    metrics.transform_template = Some("Metric {metric_name}={value}".to_string());

    let events = vec![Ok(Some(event(
        "metrics.events",
        &[],
        br#"{"metric_name": "x", "value": 87.5}"#,
    )))];
    run_bridge(vec![metrics], events, client.clone()).await;

    assert_eq!(client.calls()[0].1, "Metric x=87.5");
}

#[tokio::test]
async fn test_malformed_payload_processed_as_text() {
    let client = Arc::new(RecordingClient::new());
    let events = vec![Ok(Some(event("t", &[], b"\xff\xfenot json")))];
    run_bridge(vec![route("r", "t", "d")], events, client.clone()).await;

    // The loop survives and the raw (lossily decoded) text is delivered
    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.ends_with("not json"));
}

#[tokio::test]
async fn test_transport_failures_retried_then_dropped() {
    let client = Arc::new(RecordingClient::with_script(vec![
        Err(()),
        Err(()),
        Err(()),
    ]));
    let events = vec![Ok(Some(event("t", &[], b"{}")))];
    let (result, _, _) = run_bridge(vec![route("r", "t", "d")], events, client.clone()).await;

    assert!(result.is_ok());
    assert_eq!(client.calls().len(), 3);
}

#[tokio::test]
async fn test_application_error_not_retried() {
    let client = Arc::new(RecordingClient::with_script(vec![Ok(
        json!({"error": {"message": "agent failed"}}),
    )]));
    let events = vec![Ok(Some(event("t", &[], b"{}")))];
    let (result, _, _) = run_bridge(vec![route("r", "t", "d")], events, client.clone()).await;

    assert!(result.is_ok());
    assert_eq!(client.calls().len(), 1);
}

#[tokio::test]
async fn test_messages_processed_sequentially_in_order() {
    let client = Arc::new(RecordingClient::new());
    let events = vec![
        Ok(Some(event("t", &[], br#"{"seq": 1}"#))),
        Ok(None),
        Ok(Some(event("t", &[], br#"{"seq": 2}"#))),
        Ok(Some(event("t", &[], br#"{"seq": 3}"#))),
    ];
    run_bridge(vec![route("r", "t", "d")], events, client.clone()).await;

    let texts: Vec<String> = client.calls().into_iter().map(|(_, t, _)| t).collect();
    assert_eq!(texts.len(), 3);
    for (i, text) in texts.iter().enumerate() {
        assert!(text.contains(&format!("\"seq\": {}", i + 1)));
    }
}
