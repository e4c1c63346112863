use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use sha2::{Digest, Sha256};

use super::types::ApiTokenRecord;
use super::{AccessStore, SqliteStore, StoreError};

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn generate_raw_token() -> String {
    let bytes: [u8; 16] = rand::random();
    format!("blk_{}", hex::encode(bytes))
}

#[async_trait]
impl AccessStore for SqliteStore {
    async fn create_api_token(
        &self,
        name: &str,
        user_id: &str,
    ) -> Result<(String, ApiTokenRecord), StoreError> {
        let raw_token = generate_raw_token();
        let record = ApiTokenRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO api_tokens (id, name, user_id, token_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.name,
                record.user_id,
                hash_token(&raw_token),
                record.created_at
            ],
        )?;
        Ok((raw_token, record))
    }

    async fn resolve_api_token(&self, raw_token: &str) -> Result<Option<String>, StoreError> {
        let db = self.db.lock().await;
        Ok(db
            .query_row(
                "SELECT user_id FROM api_tokens WHERE token_hash = ?1",
                params![hash_token(raw_token)],
                |row| row.get(0),
            )
            .optional()?)
    }

    async fn has_any_api_tokens(&self) -> Result<bool, StoreError> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row("SELECT COUNT(*) FROM api_tokens", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    async fn grant_client_access(&self, user_id: &str, client_id: &str) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR IGNORE INTO client_access (user_id, client_id) VALUES (?1, ?2)",
            params![user_id, client_id],
        )?;
        Ok(())
    }

    async fn has_client_access(&self, user_id: &str, client_id: &str) -> Result<bool, StoreError> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM client_access WHERE user_id = ?1 AND client_id = ?2",
            params![user_id, client_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
