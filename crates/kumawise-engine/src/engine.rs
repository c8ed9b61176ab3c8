//! Alert-to-ticket reconciliation with deduplication
//!
//! DOWN opens a ticket unless one is already open, UP closes the open ticket,
//! anything else is ignored. The cache is always asked first and the PSA
//! backend is the authority behind it; ids learned from the backend are
//! written back so the fast path heals itself.
//!
//! Known staleness window: a DOWN that hits the cache is skipped without
//! asking the backend. If somebody closes the ticket by hand inside the PSA,
//! a monitor that stays down gets no new ticket until the entry expires
//! (cache TTL, one hour by default).

use crate::cache::StateCache;
use crate::config::{CacheConfig, EngineConfig};
use crate::repository::{RepositoryError, TicketRepository};
use kumawise_core::{
    Action, AlertRecord, AlertStatus, NewTicket, Outcome, Reconciliation, SkipReason,
    TicketSummary, DEFAULT_TICKET_PREFIX,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

// Naming and expiry settings the engine needs
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub ticket_prefix: String,
    pub cache_key_prefix: String,
    pub cache_ttl: Duration,
    pub default_company_id: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ticket_prefix: DEFAULT_TICKET_PREFIX.to_string(),
            cache_key_prefix: "kuma_ticket:".to_string(),
            cache_ttl: Duration::from_secs(3600),
            default_company_id: None,
        }
    }
}

impl EngineSettings {
    pub fn from_config(engine: &EngineConfig, cache: &CacheConfig) -> Self {
        Self {
            ticket_prefix: engine.ticket_prefix.clone(),
            cache_key_prefix: cache.key_prefix.clone(),
            cache_ttl: cache.ttl(),
            default_company_id: engine
                .default_company_id
                .clone()
                .filter(|id| !id.is_empty()),
        }
    }
}

pub struct ReconciliationEngine {
    tickets: Arc<dyn TicketRepository>,
    cache: Arc<dyn StateCache>,
    settings: EngineSettings,
}

impl ReconciliationEngine {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        cache: Arc<dyn StateCache>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            tickets,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn summary_for(&self, monitor_name: &str) -> TicketSummary {
        TicketSummary::new(&self.settings.ticket_prefix, monitor_name)
    }

    pub fn cache_key(&self, monitor_name: &str) -> String {
        format!("{}{}", self.settings.cache_key_prefix, monitor_name)
    }

    /// Decide and act for one alert. Never retries and never panics; the
    /// returned outcome tells the caller whether another attempt makes sense.
    pub async fn reconcile(&self, alert: &AlertRecord, request_id: Uuid) -> Reconciliation {
        match alert.status {
            AlertStatus::Down => self.handle_down(alert, request_id).await,
            AlertStatus::Up => self.handle_up(alert, request_id).await,
            AlertStatus::Other => {
                info!(%request_id, monitor = %alert.monitor_name, "Status not relevant, ignoring");
                Reconciliation::ignored()
            }
        }
    }

    async fn handle_down(&self, alert: &AlertRecord, request_id: Uuid) -> Reconciliation {
        let monitor = alert.monitor_name.as_str();
        info!(%request_id, monitor, "Received DOWN alert");

        let key = self.cache_key(monitor);

        // fast path: cached id means a ticket is already open
        if let Some(ticket_id) = self.cached_ticket(&key).await {
            info!(%request_id, monitor, ticket_id, "Ticket already open (cache). Skipping creation.");
            return Reconciliation::skipped(Action::Create, SkipReason::CachedTicket, Some(ticket_id));
        }

        // authoritative fallback
        let summary = self.summary_for(monitor);
        match self.tickets.find_open_ticket(summary.as_str()).await {
            Ok(Some(ticket)) => {
                info!(%request_id, monitor, ticket_id = ticket.id, "Ticket already exists. Skipping creation.");
                self.remember(&key, ticket.id).await;
                return Reconciliation::skipped(Action::Create, SkipReason::ExistingTicket, Some(ticket.id));
            }
            Ok(None) => {}
            // creating blind could duplicate a ticket the lookup missed
            Err(e) => return failure(Action::Create, request_id, monitor, "look up open ticket", e),
        }

        let company_id = alert
            .company_id
            .clone()
            .or_else(|| self.settings.default_company_id.clone());

        let new_ticket = NewTicket {
            summary,
            description: describe_outage(alert, request_id),
            monitor_name: alert.monitor_name.clone(),
            company_id,
        };

        match self.tickets.create_ticket(&new_ticket).await {
            Ok(ticket) => {
                info!(%request_id, monitor, ticket_id = ticket.id, "Ticket created");
                self.remember(&key, ticket.id).await;
                Reconciliation::success(Action::Create, ticket.id)
            }
            Err(e) => failure(Action::Create, request_id, monitor, "create ticket", e),
        }
    }

    async fn handle_up(&self, alert: &AlertRecord, request_id: Uuid) -> Reconciliation {
        let monitor = alert.monitor_name.as_str();
        info!(%request_id, monitor, "Received UP alert");

        let key = self.cache_key(monitor);

        let cached = self.cached_ticket(&key).await;
        let ticket_id = match cached {
            Some(ticket_id) => ticket_id,
            None => {
                let summary = self.summary_for(monitor);
                match self.tickets.find_open_ticket(summary.as_str()).await {
                    Ok(Some(ticket)) => ticket.id,
                    Ok(None) => {
                        info!(%request_id, monitor, "No open ticket found to close.");
                        return Reconciliation::skipped(Action::Close, SkipReason::NoOpenTicket, None);
                    }
                    // a silent skip here would leave the ticket open for good
                    Err(e) => return failure(Action::Close, request_id, monitor, "look up open ticket", e),
                }
            }
        };

        let resolution = describe_recovery(alert, request_id);
        match self.tickets.close_ticket(ticket_id, &resolution).await {
            Ok(()) => {
                info!(%request_id, monitor, ticket_id, "Ticket closed");
                self.forget(&key).await;
                Reconciliation::success(Action::Close, ticket_id)
            }
            Err(e) => {
                if cached.is_some() && !e.is_retryable() {
                    // the cached id is stale; drop it so the next DOWN asks the backend
                    self.forget(&key).await;
                } else if cached.is_none() {
                    // keep the id for the retry's fast path
                    self.remember(&key, ticket_id).await;
                }
                failure(Action::Close, request_id, monitor, "close ticket", e)
            }
        }
    }

    // cache errors and junk values count as a miss
    async fn cached_ticket(&self, key: &str) -> Option<u64> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => {
                let parsed = std::str::from_utf8(&bytes)
                    .ok()
                    .and_then(|s| s.trim().parse::<u64>().ok());
                if parsed.is_none() {
                    warn!(key, "Ignoring unreadable cache entry");
                }
                parsed
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Cache unavailable, falling back to PSA backend");
                None
            }
        }
    }

    async fn remember(&self, key: &str, ticket_id: u64) {
        let value = ticket_id.to_string();
        if let Err(e) = self
            .cache
            .set(key, value.as_bytes(), self.settings.cache_ttl)
            .await
        {
            warn!(key, ticket_id, error = %e, "Failed to cache ticket id");
        }
    }

    async fn forget(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            warn!(key, error = %e, "Failed to clear cached ticket id");
        }
    }
}

fn failure(
    action: Action,
    request_id: Uuid,
    monitor: &str,
    step: &str,
    e: RepositoryError,
) -> Reconciliation {
    let message = format!("failed to {}: {}", step, e);
    if e.is_retryable() {
        warn!(%request_id, monitor, error = %e, "Failed to {}, will retry", step);
        Reconciliation::new(action, Outcome::RetryableError(message))
    } else {
        error!(%request_id, monitor, error = %e, "Failed to {}, giving up", step);
        Reconciliation::new(action, Outcome::PermanentError(message))
    }
}

fn describe_outage(alert: &AlertRecord, request_id: Uuid) -> String {
    format!(
        "Monitor: {}\nURL: {}\nError: {}\nTime: {}\nRequest ID: {}",
        alert.monitor_name,
        alert.monitor_url.as_deref().unwrap_or("N/A"),
        alert.message,
        alert.occurred_at.as_deref().unwrap_or("N/A"),
        request_id
    )
}

fn describe_recovery(alert: &AlertRecord, request_id: Uuid) -> String {
    format!(
        "Monitor {} is back UP.\nMessage: {}\nTime: {}\nRequest ID: {}",
        alert.monitor_name,
        alert.message,
        alert.occurred_at.as_deref().unwrap_or("N/A"),
        request_id
    )
}
