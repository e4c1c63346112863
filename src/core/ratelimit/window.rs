use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};

use super::{RateBudget, SlidingWindowStore, WindowDecision, admits, bucket_of, next_admission_ms};
use crate::core::cache::{CacheError, SqliteKv};
#[cfg(test)]
use crate::core::cache::MemoryKv;

#[cfg(test)]
#[async_trait]
impl SlidingWindowStore for MemoryKv {
    async fn limit(
        &self,
        identifier: &str,
        budget: RateBudget,
        now_ms: i64,
    ) -> Result<WindowDecision, CacheError> {
        self.ensure_available()?;
        let current = bucket_of(budget, now_ms);

        let mut windows = self.windows.lock().await;
        windows.retain(|(key, bucket), _| key != identifier || *bucket >= current - 1);
        let previous_count = windows
            .get(&(identifier.to_string(), current - 1))
            .copied()
            .unwrap_or(0);
        let current_count = windows
            .entry((identifier.to_string(), current))
            .or_insert(0);

        let success = admits(previous_count, *current_count, budget, now_ms);
        let retry_at_ms = next_admission_ms(previous_count, *current_count, budget, now_ms);
        if success {
            *current_count += 1;
        }
        Ok(WindowDecision {
            success,
            retry_at_ms,
        })
    }
}

#[async_trait]
impl SlidingWindowStore for SqliteKv {
    async fn limit(
        &self,
        identifier: &str,
        budget: RateBudget,
        now_ms: i64,
    ) -> Result<WindowDecision, CacheError> {
        let current = bucket_of(budget, now_ms);

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let count_of = |bucket: i64| -> Result<u64, rusqlite::Error> {
            let count: Option<i64> = tx
                .query_row(
                    "SELECT count FROM rate_windows WHERE key = ?1 AND bucket = ?2",
                    params![identifier, bucket],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(count.unwrap_or(0).max(0) as u64)
        };
        let previous_count = count_of(current - 1)?;
        let current_count = count_of(current)?;

        let success = admits(previous_count, current_count, budget, now_ms);
        let retry_at_ms = next_admission_ms(previous_count, current_count, budget, now_ms);
        if success {
            tx.execute(
                "INSERT INTO rate_windows (key, bucket, count) VALUES (?1, ?2, 1)
                 ON CONFLICT(key, bucket) DO UPDATE SET count = count + 1",
                params![identifier, current],
            )?;
        }
        tx.execute(
            "DELETE FROM rate_windows WHERE key = ?1 AND bucket < ?2",
            params![identifier, current - 1],
        )?;
        tx.commit()?;
        Ok(WindowDecision {
            success,
            retry_at_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn sqlite_window_counts_and_resets() {
        let conn = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
        let kv = SqliteKv::new(conn).await.unwrap();
        let budget = RateBudget::per_minute(2);
        let now = 3 * 60_000 + 10_000;

        assert!(kv.limit("k", budget, now).await.unwrap().success);
        assert!(kv.limit("k", budget, now).await.unwrap().success);
        let denied = kv.limit("k", budget, now).await.unwrap();
        assert!(!denied.success);
        assert_eq!(denied.retry_at_ms, 4 * 60_000 + 1);

        // Two windows later nothing carries over.
        assert!(kv.limit("k", budget, now + 120_000).await.unwrap().success);
    }

    #[tokio::test]
    async fn memory_window_denials_do_not_consume_budget() {
        let kv = MemoryKv::new();
        let budget = RateBudget::per_minute(1);
        assert!(kv.limit("k", budget, 0).await.unwrap().success);
        for _ in 0..3 {
            assert!(!kv.limit("k", budget, 1_000).await.unwrap().success);
        }
        // Previous window held exactly one hit; at 75% through the next
        // window it weighs 0.25 and admits again.
        assert!(kv.limit("k", budget, 60_000 + 45_000).await.unwrap().success);
    }
}
