//! Task runner - pulls alert tasks off the queue and drives the engine
//!
//! Retries belong here and nowhere else. The engine reports what happened;
//! the runner turns that into ack, retry-later or give-up.

use crate::engine::ReconciliationEngine;
use crate::locks::MonitorLocks;
use crate::queue::QueueError;
use crate::retry::RetryPolicy;
use crate::telemetry::{self as names, record_reconciliation};
use async_nats::jetstream::{self, consumer, AckKind};
use futures::StreamExt;
use kumawise_core::{AlertTask, Outcome};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

// What to tell the queue about a delivered unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,             // done, success or skip
    Retry(Duration), // redeliver after the delay
    Terminate,       // never redeliver
}

/// Zero-based attempt number for a delivery count that starts at 1.
pub fn attempt_from_delivered(delivered: i64) -> u32 {
    u32::try_from(delivered.saturating_sub(1).max(0)).unwrap_or(u32::MAX)
}

pub fn ack_kind(disposition: Disposition) -> AckKind {
    match disposition {
        Disposition::Ack => AckKind::Ack,
        Disposition::Retry(delay) => AckKind::Nak(Some(delay)),
        Disposition::Terminate => AckKind::Term,
    }
}

pub struct TaskRunner {
    engine: Arc<ReconciliationEngine>,
    policy: RetryPolicy,
    locks: MonitorLocks,
    concurrency: usize,
}

impl TaskRunner {
    pub fn new(engine: Arc<ReconciliationEngine>, policy: RetryPolicy, concurrency: usize) -> Self {
        Self {
            engine,
            policy,
            locks: MonitorLocks::new(),
            concurrency: concurrency.max(1),
        }
    }

    /// Process one delivery of `task`. `attempt` counts from 0.
    pub async fn process(&self, task: &AlertTask, attempt: u32) -> Disposition {
        let monitor = task.alert.monitor_name.as_str();
        let request_id = task.request_id;

        // one unit per monitor at a time in this process
        let _guard = self.locks.lock(monitor).await;

        let started = Instant::now();
        let result = self.engine.reconcile(&task.alert, request_id).await;
        record_reconciliation(&result, started.elapsed());

        match &result.outcome {
            Outcome::Success { .. } | Outcome::Skipped { .. } => Disposition::Ack,
            Outcome::RetryableError(reason) => match self.policy.next_delay(attempt) {
                Some(delay) => {
                    warn!(
                        %request_id,
                        monitor,
                        attempt,
                        delay_secs = delay.as_secs(),
                        reason = %reason,
                        "Task failed, scheduling retry"
                    );
                    metrics::counter!(names::TASK_RETRIES_TOTAL).increment(1);
                    Disposition::Retry(delay)
                }
                None => {
                    error!(
                        %request_id,
                        monitor,
                        attempt,
                        action = result.action.as_str(),
                        reason = %reason,
                        "Task failed permanently after exhausting retries; manual intervention required"
                    );
                    metrics::counter!(names::TASKS_FAILED_TOTAL, "reason" => "retries_exhausted")
                        .increment(1);
                    Disposition::Terminate
                }
            },
            Outcome::PermanentError(reason) => {
                error!(
                    %request_id,
                    monitor,
                    attempt,
                    action = result.action.as_str(),
                    reason = %reason,
                    "Task failed permanently; manual intervention required"
                );
                metrics::counter!(names::TASKS_FAILED_TOTAL, "reason" => "rejected").increment(1);
                Disposition::Terminate
            }
        }
    }

    /// Consume the queue until the message stream ends.
    pub async fn run(
        &self,
        consumer: consumer::Consumer<consumer::pull::Config>,
    ) -> Result<(), QueueError> {
        let messages = consumer
            .messages()
            .await
            .map_err(|e| QueueError::Setup(e.to_string()))?;

        info!(concurrency = self.concurrency, "Task runner started");

        messages
            .for_each_concurrent(self.concurrency, |message| async move {
                match message {
                    Ok(message) => self.handle_message(message).await,
                    Err(e) => error!(error = %e, "Failed to receive task"),
                }
            })
            .await;

        warn!("Task stream ended");
        Ok(())
    }

    async fn handle_message(&self, message: jetstream::Message) {
        let attempt = match message.info() {
            Ok(info) => attempt_from_delivered(info.delivered),
            Err(e) => {
                warn!(error = %e, "Missing delivery info, assuming first attempt");
                0
            }
        };

        let disposition = match serde_json::from_slice::<AlertTask>(&message.payload) {
            Ok(task) => self.process(&task, attempt).await,
            Err(e) => {
                error!(error = %e, "Dropping undecodable task");
                metrics::counter!(names::TASKS_FAILED_TOTAL, "reason" => "undecodable").increment(1);
                Disposition::Terminate
            }
        };

        let acked = message.ack_with(ack_kind(disposition)).await;

        // the unit comes back after ack_wait; processing is idempotent
        if let Err(e) = acked {
            error!(error = %e, ?disposition, "Failed to acknowledge task");
        }
    }
}
