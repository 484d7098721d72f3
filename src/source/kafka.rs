//! Kafka Event Source
//!
//! rdkafka-backed [`EventSource`] implementation. The consumer runs with
//! broker auto-commit enabled, so redelivery and loss semantics on crash
//! are governed by the consumer group's commit policy, not by the bridge.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{Headers, Message};
use rdkafka::ClientConfig;
use tracing::{debug, info};

use crate::config::KafkaConfig;

use super::{EventSource, SourceError, SourceMessage};

/// Kafka consumer adapter for the bridge loop.
pub struct KafkaSource {
    consumer: Option<StreamConsumer>,
}

impl KafkaSource {
    /// Create a consumer and subscribe to the given topics.
    ///
    /// Failures here are fatal: a bridge without a working subscription
    /// has nothing to do.
    pub fn connect(config: &KafkaConfig, topics: &[String]) -> Result<Self, SourceError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true");

        if let Some(ref protocol) = config.security_protocol {
            client_config.set("security.protocol", protocol);
        }
        if let Some(ref mechanism) = config.sasl_mechanism {
            client_config.set("sasl.mechanism", mechanism);
        }
        if let Some(ref username) = config.sasl_username {
            client_config.set("sasl.username", username);
        }
        if let Some(ref password) = config.sasl_password {
            client_config.set("sasl.password", password);
        }

        let consumer: StreamConsumer = client_config
            .create()
            .map_err(|e| SourceError::Fatal(format!("failed to create consumer: {}", e)))?;

        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|e| SourceError::Fatal(format!("failed to subscribe: {}", e)))?;

        info!(
            "Kafka consumer subscribed (brokers: {}, group: {}, topics: {:?})",
            config.bootstrap_servers, config.group_id, topics
        );

        Ok(Self {
            consumer: Some(consumer),
        })
    }
}

#[async_trait]
impl EventSource for KafkaSource {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<SourceMessage>, SourceError> {
        let Some(consumer) = self.consumer.as_ref() else {
            return Err(SourceError::Fatal("consumer is closed".to_string()));
        };

        match tokio::time::timeout(timeout, consumer.recv()).await {
            Ok(Ok(message)) => {
                let mut headers = HashMap::new();
                if let Some(raw) = message.headers() {
                    for header in raw.iter() {
                        headers.insert(
                            header.key.to_string(),
                            header
                                .value
                                .map(|v| String::from_utf8_lossy(v).into_owned()),
                        );
                    }
                }

                let payload = Bytes::copy_from_slice(message.payload().unwrap_or_default());

                Ok(Some(SourceMessage {
                    topic: message.topic().to_string(),
                    headers,
                    payload,
                }))
            }
            // End of partition is not an error, just nothing new
            Ok(Err(KafkaError::PartitionEOF(partition))) => {
                debug!("End of partition {}", partition);
                Ok(None)
            }
            Ok(Err(e)) => Err(SourceError::Consume(e.to_string())),
            // Poll timeout elapsed with no message
            Err(_) => Ok(None),
        }
    }

    fn close(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.unsubscribe();
            info!("Kafka consumer closed");
        }
    }
}
