// Test doubles for the engine's collaborators
#![allow(dead_code)]

use async_trait::async_trait;
use kumawise_core::{AlertRecord, NewTicket, Ticket};
use kumawise_engine::{
    CacheError, EngineSettings, MemoryCache, ReconciliationEngine, RepositoryError, StateCache,
    TicketRepository,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Find(String),
    Create(NewTicket),
    Close(u64, String),
}

// In-memory PSA backend that records every call
pub struct FakeTickets {
    open: Mutex<HashMap<u64, String>>, // id -> summary
    next_id: AtomicU64,
    calls: Mutex<Vec<Call>>,
    // the next N calls fail with a 503
    outages: AtomicU32,
    reject_creates: AtomicBool,
    reject_closes: AtomicBool,
    latency: Duration,
}

impl FakeTickets {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            open: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1000),
            calls: Mutex::new(Vec::new()),
            outages: AtomicU32::new(0),
            reject_creates: AtomicBool::new(false),
            reject_closes: AtomicBool::new(false),
            latency,
        }
    }

    pub fn with_open_ticket(self, id: u64, summary: &str) -> Self {
        self.open.lock().unwrap().insert(id, summary.to_string());
        self
    }

    pub fn fail_next(&self, calls: u32) {
        self.outages.store(calls, Ordering::SeqCst);
    }

    pub fn reject_creates(&self) {
        self.reject_creates.store(true, Ordering::SeqCst);
    }

    pub fn reject_closes(&self) {
        self.reject_closes.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn creates(&self) -> Vec<NewTicket> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn closes(&self) -> Vec<(u64, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Close(id, text) => Some((id, text)),
                _ => None,
            })
            .collect()
    }

    pub fn finds(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Find(_)))
            .count()
    }

    pub fn is_open(&self, id: u64) -> bool {
        self.open.lock().unwrap().contains_key(&id)
    }

    async fn enter(&self, call: Call) -> Result<(), RepositoryError> {
        self.calls.lock().unwrap().push(call);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let outage = self
            .outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if outage {
            return Err(RepositoryError::Api {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TicketRepository for FakeTickets {
    async fn find_open_ticket(&self, summary: &str) -> Result<Option<Ticket>, RepositoryError> {
        self.enter(Call::Find(summary.to_string())).await?;
        let open = self.open.lock().unwrap();
        let mut ids: Vec<u64> = open
            .iter()
            .filter(|(_, s)| s.contains(summary))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids.first().map(|id| Ticket { id: *id, closed: false }))
    }

    async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket, RepositoryError> {
        self.enter(Call::Create(ticket.clone())).await?;
        if self.reject_creates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Api {
                status: 400,
                body: "company not found".to_string(),
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.open
            .lock()
            .unwrap()
            .insert(id, ticket.summary.as_str().to_string());
        Ok(Ticket { id, closed: false })
    }

    async fn close_ticket(&self, ticket_id: u64, resolution: &str) -> Result<(), RepositoryError> {
        self.enter(Call::Close(ticket_id, resolution.to_string())).await?;
        if self.reject_closes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Api {
                status: 404,
                body: "ticket not found".to_string(),
            });
        }
        self.open.lock().unwrap().remove(&ticket_id);
        Ok(())
    }
}

// A cache backend that is always down
pub struct UnreachableCache;

#[async_trait]
impl StateCache for UnreachableCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(CacheError::Timeout("get"))
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Timeout("set"))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Timeout("delete"))
    }
}

pub fn engine(tickets: Arc<FakeTickets>, cache: Arc<dyn StateCache>) -> ReconciliationEngine {
    engine_with(tickets, cache, EngineSettings::default())
}

pub fn engine_with(
    tickets: Arc<FakeTickets>,
    cache: Arc<dyn StateCache>,
    settings: EngineSettings,
) -> ReconciliationEngine {
    ReconciliationEngine::new(tickets, cache, settings)
}

pub fn memory_cache() -> Arc<MemoryCache> {
    Arc::new(MemoryCache::new())
}

pub fn down(monitor: &str) -> AlertRecord {
    AlertRecord::from_payload(&json!({
        "heartbeat": {"status": 0, "time": "2026-01-21 22:00:00"},
        "monitor": {"name": monitor},
        "msg": "Down"
    }))
}

pub fn up(monitor: &str) -> AlertRecord {
    AlertRecord::from_payload(&json!({
        "heartbeat": {"status": 1, "time": "2026-01-21 22:05:00"},
        "monitor": {"name": monitor},
        "msg": "Up"
    }))
}
