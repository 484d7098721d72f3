//! Agent Endpoint Client
//!
//! HTTP client for the agent endpoint. Each send POSTs a JSON-RPC
//! envelope to `<base>/v1/a2a/<destination>` with a bearer token and a
//! fresh request id, and returns the parsed response value.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::{DeliveryClient, DeliveryError};

/// Default per-request timeout for agent calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for a downstream agent endpoint.
pub struct AgentClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl AgentClient {
    /// Build a client with a bounded request timeout. The token is only
    /// carried, never inspected.
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }
}

#[async_trait]
impl DeliveryClient for AgentClient {
    async fn send(
        &self,
        destination_id: &str,
        text: &str,
        metadata: Option<Value>,
    ) -> Result<Value, DeliveryError> {
        let url = format!("{}/v1/a2a/{}", self.base_url, destination_id);

        let mut params = json!({
            "message": {
                "parts": [{ "kind": "text", "text": text }],
            }
        });
        if let Some(metadata) = metadata {
            params["metadata"] = metadata;
        }

        let envelope = json!({
            "jsonrpc": "2.0",
            "id": Uuid::new_v4().to_string(),
            "method": "message/send",
            "params": params,
        });

        debug!("Sending to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&envelope)
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| DeliveryError::InvalidResponse(e.to_string()))?;

        debug!("Received response: {}", body);

        Ok(body)
    }
}
