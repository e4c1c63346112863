//! Best-effort cache over a shared key-value store.
//!
//! Nothing in here ever surfaces a backend failure to the caller: reads
//! degrade to misses, writes are detached, invalidation failures are logged.

pub mod keys;
#[cfg(test)]
mod memory;
mod sqlite;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[cfg(test)]
pub use memory::MemoryKv;
pub use sqlite::SqliteKv;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("invalid key pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },
}

/// Raw key-value contract. `keys` takes a glob pattern where `*` matches
/// any run of characters and `?` a single character.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;
    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError>;
}

pub(crate) fn glob_to_regex(pattern: &str) -> Result<Regex, CacheError> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| CacheError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Clone)]
pub struct CacheGateway {
    kv: Arc<dyn KeyValueStore>,
}

impl CacheGateway {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Returns `None` on a miss, on a backend failure, and on a payload that
    /// no longer decodes as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.kv.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!("Cache hit for '{}'", key);
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry '{}': {}", key, e);
                    None
                }
            },
            Ok(None) => {
                debug!("Cache miss for '{}'", key);
                None
            }
            Err(e) => {
                warn!("Cache read for '{}' failed, treating as miss: {}", key, e);
                None
            }
        }
    }

    /// Fire-and-forget write. The value is serialized up front and the write
    /// runs on a detached task whose failure is only logged.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Skipping cache write for '{}': {}", key, e);
                return;
            }
        };
        let kv = self.kv.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            if let Err(e) = kv.set(&key, &payload, ttl).await {
                warn!("Cache write for '{}' failed: {}", key, e);
            }
        });
    }

    /// Deletes exact keys and every key matching the entries that contain `*`.
    pub async fn invalidate<S: AsRef<str>>(&self, keys: &[S]) {
        let mut doomed: Vec<String> = Vec::new();
        for key in keys {
            let key = key.as_ref();
            if key.contains('*') {
                match self.kv.keys(key).await {
                    Ok(matched) => doomed.extend(matched),
                    Err(e) => warn!("Cache pattern lookup '{}' failed: {}", key, e),
                }
            } else {
                doomed.push(key.to_string());
            }
        }
        doomed.sort();
        doomed.dedup();
        if doomed.is_empty() {
            return;
        }
        match self.kv.delete(&doomed).await {
            Ok(removed) => debug!("Invalidated {} cache entries", removed),
            Err(e) => warn!("Cache invalidation of {} keys failed: {}", doomed.len(), e),
        }
    }

    /// Cache-aside read: serve from cache, otherwise call `fetch` and
    /// populate the cache in the background.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.set(key, &value, ttl);
        Ok(value)
    }
}

#[cfg(test)]
pub(crate) async fn eventually_cached(kv: &MemoryKv, key: &str) -> bool {
    for _ in 0..100 {
        if kv.peek(key).await.is_some() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    false
}
