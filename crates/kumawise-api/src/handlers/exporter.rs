use axum::{extract::State, http::StatusCode};
use std::sync::Arc;

use crate::state::AppState;

// Handler: GET /metrics (Prometheus text format)
pub async fn render_metrics(State(state): State<Arc<AppState>>) -> (StatusCode, String) {
    match &state.prometheus {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}
