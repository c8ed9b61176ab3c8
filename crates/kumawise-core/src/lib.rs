//! Core types for the kumawise alert bridge
//! shared by the webhook acceptor, the queue worker and the reconciliation engine.
pub mod alert;
pub mod outcome;
pub mod ticket;

pub use alert::{AlertRecord, AlertStatus, extract_company_id};
pub use outcome::{Action, Outcome, Reconciliation, SkipReason};
pub use ticket::{NewTicket, Ticket, TicketSummary, DEFAULT_TICKET_PREFIX};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ALERT TASK (unit of work on the queue)

/// One accepted alert waiting to be reconciled.
///
/// The acceptor builds it once per webhook call; the worker may see it more
/// than once (at-least-once delivery), so everything downstream of it must
/// tolerate re-execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertTask {
    pub request_id: Uuid, // traceability id, echoed back to the caller

    pub received_at: DateTime<Utc>, // when the acceptor took the alert

    pub alert: AlertRecord,
}

impl AlertTask {
    pub fn new(alert: AlertRecord) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            received_at: Utc::now(),
            alert,
        }
    }
}
