//! Configuration for the bridge, read from flags with environment fallbacks
//!
//! Each binary flattens the groups it needs into its own `clap::Parser`.

use clap::{Args, ValueEnum};
use kumawise_core::DEFAULT_TICKET_PREFIX;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid URL '{0}': {1}")]
    InvalidUrl(String, String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid network '{0}': {1}")]
    InvalidNetwork(String, String),
}

// ConnectWise Manage API access
#[derive(Clone, Args)]
pub struct ConnectWiseConfig {
    // REST base url, including the api version segment
    #[arg(
        long = "cw-url",
        env = "CW_URL",
        default_value = "https://api-na.myconnectwise.net/v4_6_release/apis/3.0"
    )]
    pub base_url: String,

    #[arg(long = "cw-company", env = "CW_COMPANY")]
    pub company: Option<String>,

    #[arg(long = "cw-public-key", env = "CW_PUBLIC_KEY", hide_env_values = true)]
    pub public_key: Option<String>,

    #[arg(long = "cw-private-key", env = "CW_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    #[arg(long = "cw-client-id", env = "CW_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    #[arg(long = "cw-service-board", env = "CW_SERVICE_BOARD", default_value = "Service Board")]
    pub service_board: String,

    #[arg(long = "cw-status-new", env = "CW_STATUS_NEW", default_value = "New")]
    pub status_new: String,

    #[arg(long = "cw-status-closed", env = "CW_STATUS_CLOSED", default_value = "Closed")]
    pub status_closed: String,

    // per-request timeout in seconds
    #[arg(id = "cw_timeout_seconds", long = "cw-timeout-seconds", env = "CW_TIMEOUT_SECONDS", default_value_t = 30)]
    pub timeout_seconds: u64,
}

impl ConnectWiseConfig {
    pub fn has_credentials(&self) -> bool {
        [&self.company, &self.public_key, &self.private_key, &self.client_id]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        reqwest::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidUrl(self.base_url.clone(), e.to_string()))?;
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Zero("CW_TIMEOUT_SECONDS"));
        }
        Ok(())
    }
}

// keys stay out of logs
impl fmt::Debug for ConnectWiseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectWiseConfig")
            .field("base_url", &self.base_url)
            .field("company", &self.company)
            .field("service_board", &self.service_board)
            .field("status_new", &self.status_new)
            .field("status_closed", &self.status_closed)
            .field("has_credentials", &self.has_credentials())
            .finish()
    }
}

// Ticket naming and company resolution
#[derive(Debug, Clone, Args)]
pub struct EngineConfig {
    #[arg(long = "ticket-prefix", env = "CW_TICKET_PREFIX", default_value = DEFAULT_TICKET_PREFIX)]
    pub ticket_prefix: String,

    // used when the monitor name carries no #CW tag
    #[arg(long = "default-company-id", env = "CW_DEFAULT_COMPANY_ID")]
    pub default_company_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackend {
    Nats,   // JetStream key/value bucket, shared by all workers
    Memory, // process local, single worker only
}

#[derive(Debug, Clone, Args)]
pub struct CacheConfig {
    #[arg(long = "cache-backend", env = "CACHE_BACKEND", value_enum, default_value_t = CacheBackend::Nats)]
    pub backend: CacheBackend,

    #[arg(long = "cache-bucket", env = "CACHE_BUCKET", default_value = "kumawise_tickets")]
    pub bucket: String,

    #[arg(long = "cache-key-prefix", env = "CACHE_KEY_PREFIX", default_value = "kuma_ticket:")]
    pub key_prefix: String,

    #[arg(long = "cache-ttl-seconds", env = "CACHE_TTL_SECONDS", default_value_t = 3600)]
    pub ttl_seconds: u64,

    // timeout for a single cache call
    #[arg(id = "cache_timeout_seconds", long = "cache-timeout-seconds", env = "CACHE_TIMEOUT_SECONDS", default_value_t = 30)]
    pub timeout_seconds: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// NATS connection and the JetStream queue
#[derive(Debug, Clone, Args)]
pub struct NatsConfig {
    #[arg(long = "nats-url", env = "NATS_URL", default_value = "localhost:4222")]
    pub url: String,

    #[arg(long = "queue-stream", env = "QUEUE_STREAM", default_value = "KUMAWISE_ALERTS")]
    pub stream: String,

    #[arg(long = "queue-subject", env = "QUEUE_SUBJECT", default_value = "kumawise.alerts")]
    pub subject: String,
}

// Retry schedule: delay = base * 2^attempt, attempts 0..=max_retries
#[derive(Debug, Clone, Args)]
pub struct RetryConfig {
    #[arg(long = "retry-base-delay-seconds", env = "RETRY_BASE_DELAY_SECONDS", default_value_t = 60)]
    pub base_delay_seconds: u64,

    #[arg(long = "max-retries", env = "MAX_RETRIES", default_value_t = 5)]
    pub max_retries: u32,
}

// Worker pool
#[derive(Debug, Clone, Args)]
pub struct WorkerConfig {
    #[arg(long = "consumer", env = "QUEUE_CONSUMER", default_value = "kumawise-worker")]
    pub consumer: String,

    #[arg(long = "concurrency", env = "WORKER_CONCURRENCY", default_value_t = 4)]
    pub concurrency: usize,

    // how long an unacknowledged unit stays invisible before redelivery
    #[arg(long = "ack-wait-seconds", env = "QUEUE_ACK_WAIT_SECONDS", default_value_t = 300)]
    pub ack_wait_seconds: u64,
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Zero("WORKER_CONCURRENCY"));
        }
        if self.ack_wait_seconds == 0 {
            return Err(ConfigError::Zero("QUEUE_ACK_WAIT_SECONDS"));
        }
        Ok(())
    }
}
