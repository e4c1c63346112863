use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{CacheError, KeyValueStore};

const KV_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS kv_entries (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        expires_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS rate_windows (
        key TEXT NOT NULL,
        bucket INTEGER NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (key, bucket)
    )",
];

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Unavailable(err.to_string())
    }
}

/// Key-value store persisted in SQLite. Expiry is wall-clock milliseconds;
/// `keys` uses SQLite `GLOB` so pattern semantics match the in-memory store.
#[derive(Clone)]
pub struct SqliteKv {
    pub(crate) db: Arc<Mutex<Connection>>,
}

impl SqliteKv {
    pub async fn new(db: Arc<Mutex<Connection>>) -> Result<Self, CacheError> {
        {
            let conn = db.lock().await;
            for statement in KV_SCHEMA {
                conn.execute(statement, [])?;
            }
        }
        Ok(Self { db })
    }

    /// Drops expired entries. Run periodically by the server.
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let db = self.db.lock().await;
        let removed = db.execute(
            "DELETE FROM kv_entries WHERE expires_at <= ?1",
            params![Utc::now().timestamp_millis()],
        )?;
        Ok(removed as u64)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKv {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let db = self.db.lock().await;
        Ok(db
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1 AND expires_at > ?2",
                params![key, Utc::now().timestamp_millis()],
                |row| row.get(0),
            )
            .optional()?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Utc::now().timestamp_millis() + ttl.as_millis() as i64;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO kv_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at",
            params![key, value, expires_at],
        )?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT key FROM kv_entries WHERE key GLOB ?1 AND expires_at > ?2 ORDER BY key",
        )?;
        let rows = stmt.query_map(params![pattern, Utc::now().timestamp_millis()], |row| {
            row.get::<_, String>(0)
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let mut removed = 0u64;
        {
            let mut stmt = tx.prepare("DELETE FROM kv_entries WHERE key = ?1")?;
            for key in keys {
                removed += stmt.execute(params![key])? as u64;
            }
        }
        tx.commit()?;
        Ok(removed)
    }
}
