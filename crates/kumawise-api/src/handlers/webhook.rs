use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use kumawise_core::{AlertRecord, AlertTask};
use kumawise_engine::telemetry::WEBHOOKS_TOTAL;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::models::{QueuedResponse, StatusBody};
use crate::state::AppState;

/// Accept an Uptime Kuma notification and queue it for the worker.
///
/// Nothing here talks to the PSA backend: the caller gets a 202 as soon as
/// the task is durably queued, carrying the `request_id` that every worker
/// log line for this alert will repeat.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<QueuedResponse>), (StatusCode, Json<StatusBody>)> {
    // only a non-empty JSON object counts as an alert
    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(fields)) if !fields.is_empty() => Value::Object(fields),
        _ => {
            warn!(bytes = body.len(), "Rejected webhook without a JSON payload");
            metrics::counter!(WEBHOOKS_TOTAL, "status" => "rejected").increment(1);
            return Err(StatusBody::reply(
                StatusCode::BAD_REQUEST,
                "No JSON payload received",
            ));
        }
    };

    let task = AlertTask::new(AlertRecord::from_payload(&payload));

    if let Err(e) = state.publisher.publish(&task).await {
        error!(
            request_id = %task.request_id,
            monitor = %task.alert.monitor_name,
            error = %e,
            "Failed to queue alert"
        );
        metrics::counter!(WEBHOOKS_TOTAL, "status" => "error").increment(1);
        return Err(StatusBody::reply(
            StatusCode::SERVICE_UNAVAILABLE,
            "Failed to queue alert, try again later",
        ));
    }

    info!(
        request_id = %task.request_id,
        monitor = %task.alert.monitor_name,
        status = ?task.alert.status,
        "Webhook accepted"
    );
    metrics::counter!(WEBHOOKS_TOTAL, "status" => "queued").increment(1);

    Ok((StatusCode::ACCEPTED, Json(QueuedResponse::new(task.request_id))))
}
