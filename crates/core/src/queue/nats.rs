//! NATS JetStream work queue publisher.
//!
//! JetStream gives the extraction queue durable, at-least-once delivery:
//! the publish is only considered done once the broker acknowledges it, and
//! workers consume through a work-queue stream.

use std::time::Duration;

use async_nats::jetstream;
use async_nats::jetstream::stream::RetentionPolicy;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::QueueConfig;

use super::{ExtractionRequest, QueueError, WorkQueue};

/// Work queue publisher backed by NATS JetStream.
pub struct NatsWorkQueue {
    jetstream: jetstream::Context,
    subject: String,
}

impl NatsWorkQueue {
    /// Connect to NATS and ensure the extraction stream exists.
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let options = async_nats::ConnectOptions::new()
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .name(&config.client_name);

        let client = options
            .connect(config.urls.join(","))
            .await
            .map_err(|e| QueueError::Connect(e.to_string()))?;

        info!(urls = ?config.urls, "connected to NATS");

        let jetstream = jetstream::new(client);

        jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream.clone(),
                subjects: vec![config.subject.clone()],
                retention: RetentionPolicy::WorkQueue,
                ..Default::default()
            })
            .await
            .map_err(|e| QueueError::Connect(e.to_string()))?;

        Ok(Self {
            jetstream,
            subject: config.subject.clone(),
        })
    }
}

#[async_trait]
impl WorkQueue for NatsWorkQueue {
    fn name(&self) -> &str {
        "nats"
    }

    async fn publish(&self, request: &ExtractionRequest) -> Result<(), QueueError> {
        let payload =
            serde_json::to_vec(request).map_err(|e| QueueError::Serialization(e.to_string()))?;

        // Wait for the JetStream ack; a fire-and-forget publish could lose
        // the message and strand the task in pending.
        self.jetstream
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;

        debug!(task_id = %request.task_id, subject = %self.subject, "extraction request published");
        Ok(())
    }
}
