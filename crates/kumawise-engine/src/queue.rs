//! Durable alert queue on NATS JetStream
//!
//! The acceptor publishes one `AlertTask` per webhook and waits for the
//! stream to acknowledge it; workers pull from a durable consumer with
//! explicit acks, so a unit is redelivered until it is acked or terminated.

use crate::config::{NatsConfig, RetryConfig, WorkerConfig};
use async_nats::jetstream::{self, consumer, stream};
use async_trait::async_trait;
use kumawise_core::AlertTask;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("failed to encode task: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to publish task: {0}")]
    Publish(String),

    #[error("queue setup failed: {0}")]
    Setup(String),
}

/// Producer side of the queue, as the webhook acceptor sees it.
#[async_trait]
pub trait TaskPublisher: Send + Sync {
    /// Returns once the task is durably stored.
    async fn publish(&self, task: &AlertTask) -> Result<(), QueueError>;

    /// Whether the queue backend is currently reachable.
    fn is_healthy(&self) -> bool;
}

pub struct JetStreamQueue {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    subject: String,
}

impl JetStreamQueue {
    /// Ensure the work-queue stream exists and return a publisher for it.
    pub async fn connect(client: async_nats::Client, config: &NatsConfig) -> Result<Self, QueueError> {
        let jetstream = jetstream::new(client.clone());
        ensure_stream(&jetstream, config).await?;

        Ok(Self {
            client,
            jetstream,
            subject: config.subject.clone(),
        })
    }
}

#[async_trait]
impl TaskPublisher for JetStreamQueue {
    async fn publish(&self, task: &AlertTask) -> Result<(), QueueError> {
        let payload = serde_json::to_vec(task)?;

        // first await sends, second waits for the stream's ack
        self.jetstream
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;

        info!(
            request_id = %task.request_id,
            monitor = %task.alert.monitor_name,
            status = ?task.alert.status,
            "Alert task queued"
        );
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        matches!(
            self.client.connection_state(),
            async_nats::connection::State::Connected
        )
    }
}

pub async fn ensure_stream(
    jetstream: &jetstream::Context,
    config: &NatsConfig,
) -> Result<stream::Stream, QueueError> {
    let stream = jetstream
        .get_or_create_stream(stream::Config {
            name: config.stream.clone(),
            subjects: vec![config.subject.clone()],
            retention: stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        })
        .await
        .map_err(|e| QueueError::Setup(e.to_string()))?;

    info!(stream = %config.stream, subject = %config.subject, "Alert stream ready");
    Ok(stream)
}

/// Durable pull consumer shared by every worker process.
///
/// `max_deliver` backs up the runner's own retry ceiling so the server stops
/// redelivering even if a worker dies before it can terminate the unit.
pub async fn worker_consumer(
    jetstream: &jetstream::Context,
    nats: &NatsConfig,
    worker: &WorkerConfig,
    retry: &RetryConfig,
) -> Result<consumer::Consumer<consumer::pull::Config>, QueueError> {
    let stream = ensure_stream(jetstream, nats).await?;

    let consumer = stream
        .get_or_create_consumer(
            &worker.consumer,
            consumer::pull::Config {
                durable_name: Some(worker.consumer.clone()),
                ack_policy: consumer::AckPolicy::Explicit,
                ack_wait: Duration::from_secs(worker.ack_wait_seconds),
                max_deliver: i64::from(retry.max_retries) + 1,
                ..Default::default()
            },
        )
        .await
        .map_err(|e| QueueError::Setup(e.to_string()))?;

    info!(consumer = %worker.consumer, "Worker consumer ready");
    Ok(consumer)
}
