//! Ticket repository seam - the PSA backend as the engine sees it

use async_trait::async_trait;
use kumawise_core::{NewTicket, Ticket};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("PSA backend returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl RepositoryError {
    /// Transport trouble, throttling and server errors may clear up on their own.
    pub fn is_retryable(&self) -> bool {
        match self {
            RepositoryError::RequestFailed(e) => !e.is_builder() && !e.is_decode(),
            RepositoryError::Api { status, .. } => {
                matches!(*status, 408 | 429) || *status >= 500
            }
            RepositoryError::InvalidResponse(_) | RepositoryError::InvalidRequest(_) => false,
        }
    }
}

/// Find, open and close tickets in the system of record.
///
/// Implementations report failures through the error value and never panic;
/// the engine decides what a failure means for the alert at hand.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// First non-closed ticket whose summary contains `summary`.
    async fn find_open_ticket(&self, summary: &str) -> Result<Option<Ticket>, RepositoryError>;

    async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket, RepositoryError>;

    /// Mark the ticket closed and attach `resolution` as a resolution note.
    async fn close_ticket(&self, ticket_id: u64, resolution: &str) -> Result<(), RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> RepositoryError {
        RepositoryError::Api { status, body: String::new() }
    }

    #[test]
    fn test_classification() {
        assert!(api(500).is_retryable());
        assert!(api(503).is_retryable());
        assert!(api(429).is_retryable());
        assert!(api(408).is_retryable());
        assert!(!api(400).is_retryable());
        assert!(!api(401).is_retryable());
        assert!(!api(404).is_retryable());
        assert!(!RepositoryError::InvalidResponse("x".into()).is_retryable());
    }
}
