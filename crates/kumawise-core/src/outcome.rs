//! Outcome taxonomy for one reconciliation attempt
//!
//! The engine never raises; it returns one of these and lets the task runner
//! decide whether the unit goes back on the queue.

use serde::{Deserialize, Serialize};
use std::fmt;

// What the alert asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create, // DOWN
    Close,  // UP
    Ignore, // anything else
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Close => "close",
            Action::Ignore => "ignore",
        }
    }
}

// Why nothing was changed in the PSA backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    CachedTicket,        // fast path already knows an open ticket
    ExistingTicket,      // PSA backend already holds an open ticket
    NoOpenTicket,        // UP with nothing to close
    StatusNotActionable, // neither DOWN nor UP
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::CachedTicket => "ticket already open (cache)",
            SkipReason::ExistingTicket => "ticket already open",
            SkipReason::NoOpenTicket => "no open ticket found",
            SkipReason::StatusNotActionable => "status not relevant",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { ticket_id: u64 },
    Skipped { reason: SkipReason, ticket_id: Option<u64> },
    /// Worth another attempt later (transport failure, timeout, 5xx).
    RetryableError(String),
    /// Retrying cannot help (rejected request, malformed response).
    PermanentError(String),
}

impl Outcome {
    /// Metric label: success | skipped | error
    pub fn result_label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Skipped { .. } => "skipped",
            Outcome::RetryableError(_) | Outcome::PermanentError(_) => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::RetryableError(_) | Outcome::PermanentError(_))
    }

    pub fn ticket_id(&self) -> Option<u64> {
        match self {
            Outcome::Success { ticket_id } => Some(*ticket_id),
            Outcome::Skipped { ticket_id, .. } => *ticket_id,
            _ => None,
        }
    }
}

// Result of reconciling one alert: the action attempted and how it ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub action: Action,
    pub outcome: Outcome,
}

impl Reconciliation {
    pub fn new(action: Action, outcome: Outcome) -> Self {
        Self { action, outcome }
    }

    pub fn success(action: Action, ticket_id: u64) -> Self {
        Self::new(action, Outcome::Success { ticket_id })
    }

    pub fn skipped(action: Action, reason: SkipReason, ticket_id: Option<u64>) -> Self {
        Self::new(action, Outcome::Skipped { reason, ticket_id })
    }

    pub fn ignored() -> Self {
        Self::skipped(Action::Ignore, SkipReason::StatusNotActionable, None)
    }
}
