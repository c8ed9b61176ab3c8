//! Metric names and recording helpers shared by the acceptor and the worker

use kumawise_core::Reconciliation;
use std::time::Duration;

pub const WEBHOOKS_TOTAL: &str = "kumawise_webhooks_total";
pub const ALERTS_PROCESSED_TOTAL: &str = "kumawise_alerts_processed_total";
pub const ALERT_PROCESSING_SECONDS: &str = "kumawise_alert_processing_seconds";
pub const TASK_RETRIES_TOTAL: &str = "kumawise_task_retries_total";
pub const TASKS_FAILED_TOTAL: &str = "kumawise_tasks_failed_total";

/// Register descriptions so the exporter lists every series from startup.
pub fn describe() {
    metrics::describe_counter!(WEBHOOKS_TOTAL, "Webhook calls received, by status");
    metrics::describe_counter!(
        ALERTS_PROCESSED_TOTAL,
        "Reconciliation attempts, by action and result"
    );
    metrics::describe_histogram!(
        ALERT_PROCESSING_SECONDS,
        metrics::Unit::Seconds,
        "Time spent reconciling one alert"
    );
    metrics::describe_counter!(TASK_RETRIES_TOTAL, "Alert tasks sent back for a later retry");
    metrics::describe_counter!(
        TASKS_FAILED_TOTAL,
        "Alert tasks dropped for good and needing manual attention"
    );
}

pub fn record_reconciliation(result: &Reconciliation, elapsed: Duration) {
    metrics::counter!(
        ALERTS_PROCESSED_TOTAL,
        "action" => result.action.as_str(),
        "result" => result.outcome.result_label()
    )
    .increment(1);
    metrics::histogram!(ALERT_PROCESSING_SECONDS, "action" => result.action.as_str())
        .record(elapsed.as_secs_f64());
}
