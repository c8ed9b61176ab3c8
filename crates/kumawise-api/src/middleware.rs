use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use kumawise_engine::telemetry::WEBHOOKS_TOTAL;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::warn;

use crate::models::StatusBody;
use crate::state::AppState;

pub const TOKEN_HEADER: &str = "X-Webhook-Token";

type Rejection = (StatusCode, Json<StatusBody>);

pub async fn require_webhook_token(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Rejection> {
    let Some(expected) = state.webhook_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(token) if token == expected => Ok(next.run(request).await),
        Some(_) => Err(reject(StatusCode::UNAUTHORIZED, "Invalid webhook token")),
        None => Err(reject(StatusCode::UNAUTHORIZED, "Missing X-Webhook-Token header")),
    }
}

pub async fn enforce_allow_list(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Rejection> {
    if state.allow_list.is_empty() {
        return Ok(next.run(request).await);
    }

    match client_ip(&request, state.allow_list.trusts_forwarded_for()) {
        Some(ip) if state.allow_list.permits(ip) => Ok(next.run(request).await),
        ip => {
            warn!(client = ?ip, "Webhook from address outside the allow-list");
            Err(reject(StatusCode::FORBIDDEN, "Source address not allowed"))
        }
    }
}

// Peer address, or the first X-Forwarded-For hop behind a trusted proxy
fn client_ip(request: &Request<Body>, trust_forwarded_for: bool) -> Option<IpAddr> {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|hop| hop.trim().parse().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn reject(status: StatusCode, message: &str) -> Rejection {
    metrics::counter!(WEBHOOKS_TOTAL, "status" => "rejected").increment(1);
    StatusBody::reply(status, message)
}
