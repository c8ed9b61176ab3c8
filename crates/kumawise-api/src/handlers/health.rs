use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::warn;

use crate::models::StatusBody;
use crate::state::AppState;

// Handler: GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<StatusBody>) {
    if state.publisher.is_healthy() {
        return (StatusCode::OK, Json(StatusBody::ok()));
    }
    warn!("Health check failed: queue backend unreachable");
    StatusBody::reply(StatusCode::SERVICE_UNAVAILABLE, "Queue backend unreachable")
}
