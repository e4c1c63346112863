use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

use super::types::{
    BriefRecord, BriefStatusUpdate, ContentRecord, ContentReviewUpdate, NewBrief, NewContent,
};
use super::{BriefStore, SqliteStore, StoreError, json_column, optional_json_column, to_json};

const BRIEF_COLUMNS: &str = "id, client_id, title, target_keyword, status, priority, requirements,
     approved_at, approved_by, created_at, updated_at";

const CONTENT_COLUMNS: &str = "id, brief_id, client_id, body, word_count, quality_score,
     authority_score, readability_score, ai_model, status, reviewer_notes, revision_requests,
     human_review_time_minutes, reviewed_at, approved_at, created_at, updated_at";

fn brief_from_row(row: &Row<'_>) -> rusqlite::Result<BriefRecord> {
    Ok(BriefRecord {
        id: row.get(0)?,
        client_id: row.get(1)?,
        title: row.get(2)?,
        target_keyword: row.get(3)?,
        status: row.get(4)?,
        priority: row.get(5)?,
        requirements: json_column(row, 6)?,
        approved_at: row.get(7)?,
        approved_by: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn content_from_row(row: &Row<'_>) -> rusqlite::Result<ContentRecord> {
    Ok(ContentRecord {
        id: row.get(0)?,
        brief_id: row.get(1)?,
        client_id: row.get(2)?,
        body: row.get(3)?,
        word_count: row.get(4)?,
        quality_score: row.get(5)?,
        authority_score: row.get(6)?,
        readability_score: row.get(7)?,
        ai_model: row.get(8)?,
        status: row.get(9)?,
        reviewer_notes: row.get(10)?,
        revision_requests: optional_json_column(row, 11)?,
        human_review_time_minutes: row.get(12)?,
        reviewed_at: row.get(13)?,
        approved_at: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn select_content(
    db: &rusqlite::Connection,
    id: &str,
) -> Result<Option<ContentRecord>, StoreError> {
    let sql = format!(
        "SELECT {} FROM generated_content WHERE id = ?1 LIMIT 1",
        CONTENT_COLUMNS
    );
    Ok(db
        .query_row(&sql, params![id], content_from_row)
        .optional()?)
}

fn select_brief(db: &rusqlite::Connection, id: &str) -> Result<Option<BriefRecord>, StoreError> {
    let sql = format!(
        "SELECT {} FROM content_briefs WHERE id = ?1 LIMIT 1",
        BRIEF_COLUMNS
    );
    Ok(db.query_row(&sql, params![id], brief_from_row).optional()?)
}

#[async_trait]
impl BriefStore for SqliteStore {
    async fn get_brief(&self, id: &str) -> Result<Option<BriefRecord>, StoreError> {
        let db = self.db.lock().await;
        select_brief(&db, id)
    }

    async fn list_briefs(&self, client_id: &str) -> Result<Vec<BriefRecord>, StoreError> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT {} FROM content_briefs WHERE client_id = ?1 ORDER BY created_at DESC",
            BRIEF_COLUMNS
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params![client_id], brief_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    async fn create_brief(&self, brief: NewBrief) -> Result<BriefRecord, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let requirements = to_json(&brief.requirements)?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO content_briefs
                (id, client_id, title, target_keyword, status, priority, requirements, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'draft', ?5, ?6, ?7, ?7)",
            params![
                id,
                brief.client_id,
                brief.title,
                brief.target_keyword,
                brief.priority,
                requirements,
                now
            ],
        )?;
        select_brief(&db, &id)?.ok_or(StoreError::NotFound {
            entity: "brief",
            id,
        })
    }

    async fn update_brief_status(
        &self,
        id: &str,
        update: &BriefStatusUpdate,
    ) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE content_briefs SET
                status = ?2,
                approved_at = COALESCE(?3, approved_at),
                approved_by = COALESCE(?4, approved_by),
                updated_at = ?5
             WHERE id = ?1",
            params![
                id,
                update.status,
                update.approved_at,
                update.approved_by,
                Utc::now()
            ],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound {
                entity: "brief",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_content(&self, id: &str) -> Result<Option<ContentRecord>, StoreError> {
        let db = self.db.lock().await;
        select_content(&db, id)
    }

    async fn create_content(&self, content: NewContent) -> Result<ContentRecord, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let word_count = content.body.split_whitespace().count() as u32;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO generated_content
                (id, brief_id, client_id, body, word_count, quality_score, authority_score,
                 readability_score, ai_model, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                id,
                content.brief_id,
                content.client_id,
                content.body,
                word_count,
                content.quality_score,
                content.authority_score,
                content.readability_score,
                content.ai_model,
                content.status,
                now
            ],
        )?;
        select_content(&db, &id)?.ok_or(StoreError::NotFound {
            entity: "content",
            id,
        })
    }

    async fn apply_review(
        &self,
        content_id: &str,
        brief_id: &str,
        review: &ContentReviewUpdate,
    ) -> Result<ContentRecord, StoreError> {
        let revision_requests = review
            .revision_requests
            .as_ref()
            .map(to_json)
            .transpose()?;
        let now = Utc::now();

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;

        let content_rows = tx.execute(
            "UPDATE generated_content SET
                status = ?2,
                reviewer_notes = ?3,
                revision_requests = COALESCE(?4, revision_requests),
                human_review_time_minutes = ?5,
                reviewed_at = ?6,
                approved_at = COALESCE(?7, approved_at),
                updated_at = ?8
             WHERE id = ?1",
            params![
                content_id,
                review.status,
                review.reviewer_notes,
                revision_requests,
                review.human_review_time_minutes,
                review.reviewed_at,
                review.approved_at,
                now
            ],
        )?;
        if content_rows == 0 {
            return Err(StoreError::NotFound {
                entity: "content",
                id: content_id.to_string(),
            });
        }

        let brief_rows = tx.execute(
            "UPDATE content_briefs SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![brief_id, review.status, now],
        )?;
        if brief_rows == 0 {
            // Dropping the transaction rolls the content update back.
            return Err(StoreError::NotFound {
                entity: "brief",
                id: brief_id.to_string(),
            });
        }

        let updated = select_content(&tx, content_id)?;
        tx.commit()?;
        updated.ok_or(StoreError::NotFound {
            entity: "content",
            id: content_id.to_string(),
        })
    }
}
