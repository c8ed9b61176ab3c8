//! kumawise reconciliation engine and its collaborators

pub mod cache;
pub mod config;
pub mod connectwise;
pub mod engine;
pub mod locks;
pub mod queue;
pub mod repository;
pub mod retry;
pub mod runner;
pub mod telemetry;

pub use cache::{CacheError, MemoryCache, NatsKvCache, StateCache};
pub use connectwise::ConnectWiseClient;
pub use engine::{EngineSettings, ReconciliationEngine};
pub use queue::{JetStreamQueue, QueueError, TaskPublisher};
pub use repository::{RepositoryError, TicketRepository};
pub use retry::RetryPolicy;
pub use runner::{Disposition, TaskRunner};
