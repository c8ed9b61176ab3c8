//! Ticket identity as seen by the bridge

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TICKET_PREFIX: &str = "Uptime Kuma Alert:";

/// The stable string correlating a monitor's DOWN event with its later UP event.
///
/// Same prefix + same monitor name always gives the same summary; a renamed
/// monitor loses its correlation with tickets opened under the old name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TicketSummary(String);

impl TicketSummary {
    pub fn new(prefix: &str, monitor_name: &str) -> Self {
        Self(format!("{} {}", prefix, monitor_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// A ticket owned by the PSA backend. Only the id is ever kept by us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,

    #[serde(default, rename = "closedFlag")]
    pub closed: bool,
}

// Everything needed to open a ticket for a monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub summary: TicketSummary,
    pub description: String,
    pub monitor_name: String,
    pub company_id: Option<String>,
}
