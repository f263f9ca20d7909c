//! # Sync Outbox Repository
//!
//! The outbox is filled by [`DocumentStore::put`](crate::store::DocumentStore::put)
//! and drained by the replication engine.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  LOCAL WRITE (put)                                                     │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │  1. upsert documents row (rev + 1, new seq)                     │   │
//! │  │  2. INSERT INTO sync_outbox (doc_id, tenant_id, rev)            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            REPLICATION ENGINE (background task)                 │   │
//! │  │                                                                 │   │
//! │  │  1. pending(tenant, batch, max_attempts)                        │   │
//! │  │  2. load current documents, push to replica                     │   │
//! │  │  3. accepted → mark_synced                                      │   │
//! │  │     rejected → mark_failed (attempts + 1, last_error)           │   │
//! │  │     network error → untouched, retried with backoff             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Documents applied from a replica never enter the outbox.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `sync_state` holds small key/value markers such as the pull cursor.

use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use duka_core::time::{format_timestamp, now};

use crate::error::DbResult;

/// One queued local write.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub id: i64,
    pub doc_id: String,
    pub tenant_id: String,
    pub rev: i64,
    pub created_at: String,
    pub attempts: i64,
    pub last_error: Option<String>,
}

/// Repository for sync outbox operations.
#[derive(Debug, Clone)]
pub struct SyncOutboxRepository {
    pool: SqlitePool,
}

impl SyncOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SyncOutboxRepository { pool }
    }

    /// Unsynced entries of a tenant, oldest first. Entries that already
    /// failed `max_attempts` times are left out.
    pub async fn pending(
        &self,
        tenant_id: &str,
        limit: u32,
        max_attempts: u32,
    ) -> DbResult<Vec<OutboxEntry>> {
        let entries = sqlx::query_as::<_, OutboxEntry>(
            r#"
            SELECT id, doc_id, tenant_id, rev, created_at, attempts, last_error
            FROM sync_outbox
            WHERE tenant_id = ?1 AND synced_at IS NULL AND attempts < ?2
            ORDER BY id ASC
            LIMIT ?3
            "#,
        )
        .bind(tenant_id)
        .bind(max_attempts as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Marks entries as acknowledged by the replica.
    pub async fn mark_synced(&self, ids: &[i64]) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let stamp = format_timestamp(&now());
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE sync_outbox SET synced_at = ");
        qb.push_bind(stamp.clone())
            .push(", attempted_at = ")
            .push_bind(stamp)
            .push(" WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = qb.build().execute(&self.pool).await?;
        debug!(count = result.rows_affected(), "Outbox entries marked synced");
        Ok(result.rows_affected())
    }

    /// Records a rejected push.
    pub async fn mark_failed(&self, id: i64, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE sync_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(format_timestamp(&now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count_pending(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sync_outbox WHERE tenant_id = ?1 AND synced_at IS NULL",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Entries that exhausted their attempts and are no longer pushed.
    pub async fn count_stalled(&self, tenant_id: &str, max_attempts: u32) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM sync_outbox
            WHERE tenant_id = ?1 AND synced_at IS NULL AND attempts >= ?2
            "#,
        )
        .bind(tenant_id)
        .bind(max_attempts as i64)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Deletes entries synced more than `days_old` days ago.
    pub async fn cleanup_old_entries(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = now() - chrono::Duration::days(days_old as i64);
        let result = sqlx::query(
            "DELETE FROM sync_outbox WHERE synced_at IS NOT NULL AND synced_at < ?1",
        )
        .bind(format_timestamp(&cutoff))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Sync State
    // =========================================================================

    pub async fn get_state(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM sync_state WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn set_state(&self, key: &str, value: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Numeric cursor stored under `key`, 0 when unset or unreadable.
    pub async fn get_cursor(&self, key: &str) -> DbResult<i64> {
        Ok(self
            .get_state(key)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    pub async fn set_cursor(&self, key: &str, value: i64) -> DbResult<()> {
        self.set_state(key, &value.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::test_support::*;

    #[tokio::test]
    async fn test_every_local_write_is_queued() {
        let db = db().await;
        let customers = db.customers(TENANT);
        let created = customers.create(customer("Amina", false)).await.unwrap();
        customers.adjust_balance(&created.id, 10).await.unwrap();

        let outbox = db.outbox();
        let pending = outbox.pending(TENANT, 10, 5).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].doc_id, created.id);
        assert_eq!(pending[0].rev, 1);
        assert_eq!(pending[1].rev, 2);
        assert_eq!(outbox.count_pending(TENANT).await.unwrap(), 2);
        assert_eq!(outbox.count_pending("s2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_synced_and_failed() {
        let db = db().await;
        let customers = db.customers(TENANT);
        customers.create(customer("A", false)).await.unwrap();
        customers.create(customer("B", false)).await.unwrap();

        let outbox = db.outbox();
        let pending = outbox.pending(TENANT, 10, 2).await.unwrap();
        assert_eq!(outbox.mark_synced(&[pending[0].id]).await.unwrap(), 1);
        assert_eq!(outbox.mark_synced(&[]).await.unwrap(), 0);

        outbox.mark_failed(pending[1].id, "rejected").await.unwrap();
        let retry = outbox.pending(TENANT, 10, 2).await.unwrap();
        assert_eq!(retry.len(), 1);
        assert_eq!(retry[0].attempts, 1);
        assert_eq!(retry[0].last_error.as_deref(), Some("rejected"));

        outbox.mark_failed(pending[1].id, "rejected again").await.unwrap();
        assert!(outbox.pending(TENANT, 10, 2).await.unwrap().is_empty());
        assert_eq!(outbox.count_stalled(TENANT, 2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_entries() {
        let db = db().await;
        db.customers(TENANT).create(customer("A", false)).await.unwrap();
        let outbox = db.outbox();
        let pending = outbox.pending(TENANT, 10, 5).await.unwrap();
        outbox.mark_synced(&[pending[0].id]).await.unwrap();

        assert_eq!(outbox.cleanup_old_entries(7).await.unwrap(), 0);
        assert_eq!(outbox.count_pending(TENANT).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cursor_round_trip() {
        let db = db().await;
        let outbox = db.outbox();
        assert_eq!(outbox.get_cursor("pull:s1").await.unwrap(), 0);
        outbox.set_cursor("pull:s1", 42).await.unwrap();
        outbox.set_cursor("pull:s1", 43).await.unwrap();
        assert_eq!(outbox.get_cursor("pull:s1").await.unwrap(), 43);
    }
}
