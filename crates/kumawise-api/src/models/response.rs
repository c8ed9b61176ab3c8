use axum::{http::StatusCode, Json};
use serde::Serialize;
use uuid::Uuid;

/// `{"status": ..., "message": ...}` body used for health and errors
#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusBody {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: Some(message.into()),
        }
    }

    pub fn reply(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (status, Json(Self::error(message)))
    }
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub status: &'static str,
    pub request_id: Uuid,
}

impl QueuedResponse {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            status: "queued",
            request_id,
        }
    }
}
