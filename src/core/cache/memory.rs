use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{CacheError, KeyValueStore, glob_to_regex};

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// In-process stand-in for the shared key-value backend.
/// `set_available(false)` simulates an outage.
pub struct MemoryKv {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    /// Sliding-window counters keyed by (identifier, window index).
    pub(crate) windows: Mutex<HashMap<(String, i64), u64>>,
    available: AtomicBool,
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKv {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            windows: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub(crate) fn ensure_available(&self) -> Result<(), CacheError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Unavailable("memory store marked unavailable".into()))
        }
    }

    /// Reads a live entry regardless of availability.
    pub(crate) async fn peek(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.ensure_available()?;
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.ensure_available()?;
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.ensure_available()?;
        let re = glob_to_regex(pattern)?;
        let entries = self.entries.lock().await;
        let now = Instant::now();
        let mut out: Vec<String> = entries
            .iter()
            .filter(|(k, e)| e.expires_at > now && re.is_match(k))
            .map(|(k, _)| k.clone())
            .collect();
        out.sort();
        Ok(out)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        self.ensure_available()?;
        let mut entries = self.entries.lock().await;
        let removed = keys
            .iter()
            .filter(|k| entries.remove(k.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let kv = MemoryKv::new();
        kv.set("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(kv.get("k").await.unwrap().is_none());
        assert!(kv.keys("*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn outage_fails_every_operation() {
        let kv = MemoryKv::new();
        kv.set_available(false);
        assert!(kv.get("k").await.is_err());
        assert!(kv.set("k", "v", Duration::from_secs(1)).await.is_err());
        assert!(kv.keys("*").await.is_err());
        assert!(kv.delete(&["k".into()]).await.is_err());
    }

    #[tokio::test]
    async fn delete_reports_removed_count() {
        let kv = MemoryKv::new();
        kv.set("a", "1", Duration::from_secs(5)).await.unwrap();
        let removed = kv.delete(&["a".into(), "b".into()]).await.unwrap();
        assert_eq!(removed, 1);
    }
}
