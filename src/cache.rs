use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MiddlewareError;

/// Key/value store shared between processes (memcached, redis, ...).
///
/// Values are opaque strings; the pool stores JSON documents in them.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a value; `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value that expires after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration);
}

/// Per-host connection failure counters for replicas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureStatistics {
    counts: BTreeMap<String, u32>,
}

impl FailureStatistics {
    /// Recorded failures for `host`; zero when the host never failed.
    #[must_use]
    pub fn failures(&self, host: &str) -> u32 {
        self.counts.get(host).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, host: &str) -> u32 {
        let count = self.counts.entry(host.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(host, count)| (host.as_str(), *count))
    }

    /// Load the statistics stored under `key`. A missing entry yields empty statistics.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Serialization` if the cached document is not valid.
    pub async fn load(cache: &dyn Cache, key: &str) -> Result<Self, MiddlewareError> {
        match cache.get(key).await {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Self::default()),
        }
    }

    /// Rewrite the whole statistics document under `key`.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Serialization` if the statistics cannot be encoded.
    pub async fn store(&self, cache: &dyn Cache, key: &str, ttl: Duration) -> Result<(), MiddlewareError> {
        let raw = serde_json::to_string(self)?;
        cache.set(key, raw, ttl).await;
        Ok(())
    }
}

/// In-process [`Cache`] with per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (String, Instant)>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.lock();
        let now = Instant::now();
        if matches!(entries.get(key), Some((_, expires)) if *expires <= now) {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|(value, _)| value.clone())
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        self.lock()
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }
}
