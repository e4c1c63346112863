use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

use super::types::{
    CallOutcome, HealthObservation, HealthRecord, HealthStatus, RequestLogEntry, RequestLogRecord,
    StoredOAuthToken,
};
use super::{IntegrationStore, SqliteStore, StoreError};

/// Weight of the newest sample in the rolling response-time average.
const RESPONSE_TIME_ALPHA: f64 = 0.2;

fn health_from_row(row: &Row<'_>) -> rusqlite::Result<HealthRecord> {
    let status: String = row.get(1)?;
    Ok(HealthRecord {
        provider: row.get(0)?,
        status: HealthStatus::from_status(&status),
        last_success_at: row.get(2)?,
        last_failure_at: row.get(3)?,
        error_count: row.get(4)?,
        avg_response_time_ms: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[async_trait]
impl IntegrationStore for SqliteStore {
    async fn upsert_health(&self, observation: &HealthObservation) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        match observation.outcome {
            CallOutcome::Success => {
                db.execute(
                    "INSERT INTO integration_health
                        (provider, status, last_success_at, error_count, avg_response_time_ms, updated_at)
                     VALUES (?1, 'healthy', ?2, 0, ?3, ?2)
                     ON CONFLICT(provider) DO UPDATE SET
                        status = 'healthy',
                        last_success_at = excluded.last_success_at,
                        error_count = 0,
                        avg_response_time_ms = CASE
                            WHEN integration_health.avg_response_time_ms IS NULL
                                THEN excluded.avg_response_time_ms
                            ELSE integration_health.avg_response_time_ms * (1.0 - ?4)
                                + excluded.avg_response_time_ms * ?4
                        END,
                        updated_at = excluded.updated_at",
                    params![
                        observation.provider,
                        observation.observed_at,
                        observation.response_time_ms as f64,
                        RESPONSE_TIME_ALPHA
                    ],
                )?;
            }
            CallOutcome::Failure => {
                db.execute(
                    "INSERT INTO integration_health
                        (provider, status, last_failure_at, error_count, updated_at)
                     VALUES (?1, 'degraded', ?2, 1, ?2)
                     ON CONFLICT(provider) DO UPDATE SET
                        status = 'degraded',
                        last_failure_at = excluded.last_failure_at,
                        error_count = integration_health.error_count + 1,
                        updated_at = excluded.updated_at",
                    params![observation.provider, observation.observed_at],
                )?;
            }
        }
        Ok(())
    }

    async fn get_health(&self, provider: &str) -> Result<Option<HealthRecord>, StoreError> {
        let db = self.db.lock().await;
        Ok(db
            .query_row(
                "SELECT provider, status, last_success_at, last_failure_at, error_count,
                        avg_response_time_ms, updated_at
                 FROM integration_health WHERE provider = ?1",
                params![provider],
                health_from_row,
            )
            .optional()?)
    }

    async fn list_health(&self) -> Result<Vec<HealthRecord>, StoreError> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT provider, status, last_success_at, last_failure_at, error_count,
                    avg_response_time_ms, updated_at
             FROM integration_health ORDER BY provider ASC",
        )?;
        let rows = stmt.query_map([], health_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    async fn append_request_log(&self, entry: &RequestLogEntry) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO api_request_logs
                (client_id, provider, endpoint, status_code, response_time_ms, error_message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.client_id,
                entry.provider,
                entry.endpoint,
                entry.status_code,
                i64::try_from(entry.response_time_ms).unwrap_or(i64::MAX),
                entry.error_message,
                Utc::now()
            ],
        )?;
        Ok(())
    }

    async fn recent_request_logs(&self, limit: usize) -> Result<Vec<RequestLogRecord>, StoreError> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, client_id, provider, endpoint, status_code, response_time_ms,
                    error_message, created_at
             FROM api_request_logs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(RequestLogRecord {
                id: row.get(0)?,
                client_id: row.get(1)?,
                provider: row.get(2)?,
                endpoint: row.get(3)?,
                status_code: row.get(4)?,
                response_time_ms: row.get::<_, i64>(5)?.max(0) as u64,
                error_message: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    async fn load_oauth_token(
        &self,
        provider: &str,
    ) -> Result<Option<StoredOAuthToken>, StoreError> {
        let db = self.db.lock().await;
        Ok(db
            .query_row(
                "SELECT provider, access_token, refresh_token, expires_at
                 FROM oauth_tokens WHERE provider = ?1",
                params![provider],
                |row| {
                    Ok(StoredOAuthToken {
                        provider: row.get(0)?,
                        access_token: row.get(1)?,
                        refresh_token: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    async fn save_oauth_token(&self, token: &StoredOAuthToken) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO oauth_tokens (provider, access_token, refresh_token, expires_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP)
             ON CONFLICT(provider) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                updated_at = CURRENT_TIMESTAMP",
            params![
                token.provider,
                token.access_token,
                token.refresh_token,
                token.expires_at
            ],
        )?;
        Ok(())
    }
}
