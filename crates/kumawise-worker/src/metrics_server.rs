use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use std::sync::Arc;

type HealthCheck = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Clone)]
struct ServerState {
    prometheus: PrometheusHandle,
    is_healthy: HealthCheck,
}

/// `/metrics` and `/health` for the worker process.
///
/// `is_healthy` reports whether the queue connection is usable.
pub fn build_router(
    prometheus: PrometheusHandle,
    is_healthy: impl Fn() -> bool + Send + Sync + 'static,
) -> Router {
    Router::new()
        .route("/metrics", get(prometheus_metrics))
        .route("/health", get(health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(ServerState {
            prometheus,
            is_healthy: Arc::new(is_healthy),
        })
}

async fn prometheus_metrics(State(state): State<ServerState>) -> (StatusCode, String) {
    (StatusCode::OK, state.prometheus.render())
}

async fn health(State(state): State<ServerState>) -> (StatusCode, Json<Value>) {
    if (state.is_healthy)() {
        (StatusCode::OK, Json(json!({"status": "ok"})))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "error", "message": "Queue backend unreachable"})),
        )
    }
}
