//! Advisory monitor -> ticket id cache
//!
//! The cache only ever saves round trips to the PSA backend. An entry means
//! "probably open"; a missing entry means nothing, and every caller must stay
//! correct when the backend is empty or unreachable.

use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache backend error during {op}: {message}")]
    Backend { op: &'static str, message: String },

    #[error("cache {0} timed out")]
    Timeout(&'static str),
}

#[async_trait]
pub trait StateCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

// IN-MEMORY

/// Process-local cache with per-entry expiry. Not shared between workers.
#[derive(Default)]
pub struct MemoryCache {
    // None = no deadline
    entries: Mutex<HashMap<String, (Vec<u8>, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Vec<u8>, Option<Instant>)>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StateCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.entries();
        match entries.get(key) {
            Some((_, Some(expires_at))) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        // a ttl too large for Instant never expires
        let expires_at = Instant::now().checked_add(ttl);
        self.entries().insert(key.to_string(), (value.to_vec(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries().remove(key);
        Ok(())
    }
}

// NATS JETSTREAM KEY/VALUE

/// Cache backed by a JetStream KV bucket shared by every worker.
///
/// Expiry is the bucket's max age, fixed when the bucket is created; the
/// per-call ttl is only checked against it. KV keys are restricted to
/// `[-/_=.a-zA-Z0-9]`, so logical keys are stored hex encoded.
pub struct NatsKvCache {
    store: kv::Store,
    ttl: Duration,
    timeout: Duration,
}

impl NatsKvCache {
    /// Open the bucket, creating it with `ttl` as max age when missing.
    pub async fn open(
        jetstream: &jetstream::Context,
        bucket: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Self, CacheError> {
        let store = match jetstream.get_key_value(bucket).await {
            Ok(store) => store,
            Err(_) => jetstream
                .create_key_value(kv::Config {
                    bucket: bucket.to_string(),
                    history: 1,
                    max_age: ttl,
                    ..Default::default()
                })
                .await
                .map_err(|e| CacheError::Backend {
                    op: "create bucket",
                    message: e.to_string(),
                })?,
        };

        info!(bucket, ttl_secs = ttl.as_secs(), "Ticket cache bucket ready");

        Ok(Self { store, ttl, timeout })
    }

    fn storage_key(key: &str) -> String {
        hex::encode(key)
    }

    async fn bounded<T, E: Display>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, E>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CacheError::Backend {
                op,
                message: e.to_string(),
            }),
            Err(_) => Err(CacheError::Timeout(op)),
        }
    }
}

#[async_trait]
impl StateCache for NatsKvCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let storage_key = Self::storage_key(key);
        let value = self.bounded("get", self.store.get(storage_key.as_str())).await?;
        Ok(value.map(|bytes| bytes.to_vec()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        if ttl != self.ttl {
            debug!(
                requested_secs = ttl.as_secs(),
                bucket_secs = self.ttl.as_secs(),
                "Bucket max age overrides requested ttl"
            );
        }
        let storage_key = Self::storage_key(key);
        self.bounded("set", self.store.put(storage_key.as_str(), value.to_vec().into()))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let storage_key = Self::storage_key(key);
        self.bounded("delete", self.store.delete(storage_key.as_str())).await
    }
}
