use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};

use super::types::{ClientRecord, CompetitorRecord};
use super::{ClientStore, SqliteStore, StoreError, json_column, to_json};

#[async_trait]
impl ClientStore for SqliteStore {
    async fn get_client(&self, id: &str) -> Result<Option<ClientRecord>, StoreError> {
        let db = self.db.lock().await;
        Ok(db
            .query_row(
                "SELECT id, name, domain, target_keywords FROM clients WHERE id = ?1 LIMIT 1",
                params![id],
                |row| {
                    Ok(ClientRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        domain: row.get(2)?,
                        target_keywords: json_column(row, 3)?,
                    })
                },
            )
            .optional()?)
    }

    async fn upsert_client(&self, client: &ClientRecord) -> Result<(), StoreError> {
        let keywords = to_json(&client.target_keywords)?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO clients (id, name, domain, target_keywords) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                domain = excluded.domain,
                target_keywords = excluded.target_keywords",
            params![client.id, client.name, client.domain, keywords],
        )?;
        Ok(())
    }

    async fn list_competitors(&self, client_id: &str) -> Result<Vec<CompetitorRecord>, StoreError> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, client_id, name, domain FROM competitors
             WHERE client_id = ?1 ORDER BY domain ASC",
        )?;
        let rows = stmt.query_map(params![client_id], |row| {
            Ok(CompetitorRecord {
                id: row.get(0)?,
                client_id: row.get(1)?,
                name: row.get(2)?,
                domain: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    async fn add_competitor(
        &self,
        client_id: &str,
        name: &str,
        domain: &str,
    ) -> Result<CompetitorRecord, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO competitors (id, client_id, name, domain) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(client_id, domain) DO UPDATE SET name = excluded.name",
            params![id, client_id, name, domain],
        )?;
        let record = db.query_row(
            "SELECT id, client_id, name, domain FROM competitors
             WHERE client_id = ?1 AND domain = ?2",
            params![client_id, domain],
            |row| {
                Ok(CompetitorRecord {
                    id: row.get(0)?,
                    client_id: row.get(1)?,
                    name: row.get(2)?,
                    domain: row.get(3)?,
                })
            },
        )?;
        Ok(record)
    }
}
