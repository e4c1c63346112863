//! Record persistence.
//!
//! The core talks to the relational store only through the traits below,
//! split by concern so each component can be handed the narrowest view it
//! needs. [`SqliteStore`] is the production implementation; tests open it
//! in memory.

mod briefs;
mod clients;
mod integrations;
mod tokens;
pub mod types;

use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

pub use types::{
    ApiTokenRecord, BriefRecord, BriefRequirements, BriefStatusUpdate, CallOutcome, ClientRecord,
    CompetitorRecord, ContentRecord, ContentReviewUpdate, HealthObservation, HealthRecord,
    HealthStatus, NewBrief, NewContent, RequestLogEntry, RequestLogRecord, StoredOAuthToken,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("stored record could not be decoded: {0}")]
    Decode(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

#[async_trait]
pub trait BriefStore: Send + Sync {
    async fn get_brief(&self, id: &str) -> Result<Option<BriefRecord>, StoreError>;
    async fn list_briefs(&self, client_id: &str) -> Result<Vec<BriefRecord>, StoreError>;
    async fn create_brief(&self, brief: NewBrief) -> Result<BriefRecord, StoreError>;
    /// Fails with `NotFound` when no brief has this id.
    async fn update_brief_status(
        &self,
        id: &str,
        update: &BriefStatusUpdate,
    ) -> Result<(), StoreError>;
    async fn get_content(&self, id: &str) -> Result<Option<ContentRecord>, StoreError>;
    async fn create_content(&self, content: NewContent) -> Result<ContentRecord, StoreError>;
    /// Writes the review onto the content row and mirrors its status onto the
    /// parent brief in one transaction: either both rows change or neither.
    async fn apply_review(
        &self,
        content_id: &str,
        brief_id: &str,
        review: &ContentReviewUpdate,
    ) -> Result<ContentRecord, StoreError>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn get_client(&self, id: &str) -> Result<Option<ClientRecord>, StoreError>;
    async fn upsert_client(&self, client: &ClientRecord) -> Result<(), StoreError>;
    async fn list_competitors(&self, client_id: &str) -> Result<Vec<CompetitorRecord>, StoreError>;
    async fn add_competitor(
        &self,
        client_id: &str,
        name: &str,
        domain: &str,
    ) -> Result<CompetitorRecord, StoreError>;
}

#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// Last-writer-wins upsert keyed on provider name. Counters and averages
    /// are computed by the store inside the upsert statement.
    async fn upsert_health(&self, observation: &HealthObservation) -> Result<(), StoreError>;
    async fn get_health(&self, provider: &str) -> Result<Option<HealthRecord>, StoreError>;
    async fn list_health(&self) -> Result<Vec<HealthRecord>, StoreError>;
    async fn append_request_log(&self, entry: &RequestLogEntry) -> Result<(), StoreError>;
    async fn recent_request_logs(&self, limit: usize) -> Result<Vec<RequestLogRecord>, StoreError>;
    async fn load_oauth_token(&self, provider: &str)
    -> Result<Option<StoredOAuthToken>, StoreError>;
    async fn save_oauth_token(&self, token: &StoredOAuthToken) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AccessStore: Send + Sync {
    /// Returns the raw token (shown once) and its record.
    async fn create_api_token(
        &self,
        name: &str,
        user_id: &str,
    ) -> Result<(String, ApiTokenRecord), StoreError>;
    /// Maps a raw bearer token to the user it was issued for.
    async fn resolve_api_token(&self, raw_token: &str) -> Result<Option<String>, StoreError>;
    async fn has_any_api_tokens(&self) -> Result<bool, StoreError>;
    async fn grant_client_access(&self, user_id: &str, client_id: &str) -> Result<(), StoreError>;
    async fn has_client_access(&self, user_id: &str, client_id: &str) -> Result<bool, StoreError>;
}

pub trait RecordStore: BriefStore + ClientStore + IntegrationStore + AccessStore {}

impl<T> RecordStore for T where T: BriefStore + ClientStore + IntegrationStore + AccessStore {}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS clients (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        domain TEXT NOT NULL,
        target_keywords TEXT NOT NULL DEFAULT '[]',
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS competitors (
        id TEXT PRIMARY KEY,
        client_id TEXT NOT NULL,
        name TEXT NOT NULL,
        domain TEXT NOT NULL,
        UNIQUE (client_id, domain)
    )",
    "CREATE TABLE IF NOT EXISTS content_briefs (
        id TEXT PRIMARY KEY,
        client_id TEXT NOT NULL,
        title TEXT NOT NULL,
        target_keyword TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'draft',
        priority TEXT NOT NULL DEFAULT 'medium',
        requirements TEXT NOT NULL DEFAULT '{}',
        approved_at TEXT,
        approved_by TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS generated_content (
        id TEXT PRIMARY KEY,
        brief_id TEXT NOT NULL,
        client_id TEXT NOT NULL,
        body TEXT NOT NULL,
        word_count INTEGER NOT NULL DEFAULT 0,
        quality_score REAL,
        authority_score REAL,
        readability_score REAL,
        ai_model TEXT,
        status TEXT NOT NULL,
        reviewer_notes TEXT,
        revision_requests TEXT,
        human_review_time_minutes INTEGER,
        reviewed_at TEXT,
        approved_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS integration_health (
        provider TEXT PRIMARY KEY,
        status TEXT NOT NULL DEFAULT 'unknown',
        last_success_at TEXT,
        last_failure_at TEXT,
        error_count INTEGER NOT NULL DEFAULT 0,
        avg_response_time_ms REAL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS api_request_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id TEXT,
        provider TEXT NOT NULL,
        endpoint TEXT NOT NULL,
        status_code INTEGER,
        response_time_ms INTEGER NOT NULL,
        error_message TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS oauth_tokens (
        provider TEXT PRIMARY KEY,
        access_token TEXT NOT NULL,
        refresh_token TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS api_tokens (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        user_id TEXT NOT NULL,
        token_hash TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS client_access (
        user_id TEXT NOT NULL,
        client_id TEXT NOT NULL,
        PRIMARY KEY (user_id, client_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_content_briefs_client ON content_briefs(client_id)",
    "CREATE INDEX IF NOT EXISTS idx_api_request_logs_provider ON api_request_logs(provider, id)",
];

/// SQLite-backed record store. The connection is shared with the
/// key-value cache and the rate limiter so all shared state lives in one place.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let db = Connection::open(path)?;
        info!("Opened record store at {}", path.display());
        Self::with_connection(db).await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?).await
    }

    async fn with_connection(db: Connection) -> Result<Self, StoreError> {
        for statement in SCHEMA {
            db.execute(statement, [])?;
        }
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub fn get_db(&self) -> Arc<Mutex<Connection>> {
        self.db.clone()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    Ok(serde_json::to_string(value)?)
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn optional_json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_is_idempotent() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let db = store.get_db();
        let db = db.lock().await;
        for statement in SCHEMA {
            db.execute(statement, []).expect("schema statement reruns");
        }
    }

    #[tokio::test]
    async fn open_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("briefline.db");
        let store = SqliteStore::open(&path).await.unwrap();
        assert!(path.exists());
        assert!(store.list_health().await.unwrap().is_empty());
    }
}
