//! # Schema Migrations
//!
//! The store keeps every record type in one `documents` table, so the schema
//! is small and changes rarely.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  migrations/sqlite/001_documents.sql                                    │
//! │                                                                         │
//! │   documents    id · tenant · record_type · state · rev · seq · body     │
//! │   sync_outbox  document_id · rev · attempts · last_error · synced_at    │
//! │   sync_state   key ("pull:<tenant>") · value                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Selector indexes over JSON fields are created on demand by
//! `DocumentStore::ensure_index`, not here. New schema goes in a new numbered
//! file; applied files are never edited.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies any embedded migration the database has not seen yet.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let known = MIGRATOR.migrations.len();
    debug!(known, "Applying document store schema");

    MIGRATOR.run(pool).await?;

    info!(known, "Document store schema up to date");
    Ok(())
}

/// `(embedded, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let embedded = MIGRATOR.migrations.len();
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;

    Ok((embedded, usize::try_from(applied).unwrap_or(0)))
}
