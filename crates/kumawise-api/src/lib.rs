//! Webhook acceptor: validates Uptime Kuma notifications and queues them

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::middleware::{enforce_allow_list, require_webhook_token};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    // the allow-list runs first, then the token check
    let webhook = Router::new()
        .route("/webhook", post(handlers::receive_webhook))
        .layer(from_fn_with_state(state.clone(), require_webhook_token))
        .layer(from_fn_with_state(state.clone(), enforce_allow_list));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::render_metrics))
        .merge(webhook)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
