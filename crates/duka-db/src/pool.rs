//! # Database Pool Management
//!
//! Connection pool creation and the [`Database`] handle every service
//! hangs off.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Handle                                    │
//! │                                                                         │
//! │  Node Startup                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← Configure pool settings                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Pool + migrations + default indexes     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────────┐  │
//! │  │  SqlitePool  │  │   EventBus   │  │ KeyedLocks (per document id) │  │
//! │  └──────┬───────┘  └──────┬───────┘  └──────────────┬───────────────┘  │
//! │         └─────────────────┴─────────────────────────┘                  │
//! │                           │ cloned into                                 │
//! │                           ▼                                             │
//! │  store() outbox() customers(t) products(t) sales(t) finance(t) ...     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File databases run in WAL mode so report scans never block the till.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::events::{EventBus, LedgerEvent};
use crate::locks::KeyedLocks;
use crate::migrations;
use crate::repository::finance::FinanceRepository;
use crate::repository::party::{CustomerRepository, StaffRepository, SupplierRepository};
use crate::repository::product::ProductRepository;
use crate::repository::reports::ReportRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::sync::SyncOutboxRepository;
use crate::store::DocumentStore;

/// Fields indexed on every node at startup.
const DEFAULT_INDEXES: &[&[&str]] = &[&["name"], &["customerId"], &["date"]];

// =============================================================================
// Configuration
// =============================================================================

/// Store file and pool sizing.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new(data_dir.join("duka.db"))).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Store file, or `:memory:`.
    pub database_path: PathBuf,
    /// Readers share the pool with the single writer WAL allows. Default 5.
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    /// `None` for in-memory stores: dropping the last connection drops the data.
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
    /// Apply the schema and default selector indexes on open. Default true.
    pub run_migrations: bool,
    /// Ledger events buffered per subscriber before it lags. Default 256.
    pub event_capacity: usize,
}

impl DbConfig {
    /// A store file, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
            run_migrations: true,
            event_capacity: 256,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self.min_connections = self.min_connections.min(max);
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// A private store that lives as long as its one connection. Tests use it.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            max_lifetime: None,
            run_migrations: true,
            event_capacity: 256,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle. Cheap to clone; clones share the pool, the event
/// bus and the document locks.
///
/// ## Usage
/// ```rust,ignore
/// let sale = db.sales(&tenant).create(input).await?;
/// let statement = db.reports(&tenant).income_statement(&range).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    events: EventBus,
    locks: KeyedLocks,
}

impl Database {
    /// Opens the pool, runs migrations and creates the default JSON
    /// indexes.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening document store");

        let base_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
            SqliteConnectOptions::from_str(&connect_url)
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
                // Readers don't block the writer
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true)
        };
        let connect_options = base_options
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(max_connections = config.max_connections, "Store pool ready");

        let db = Database {
            pool,
            events: EventBus::new(config.event_capacity),
            locks: KeyedLocks::new(),
        };

        if config.run_migrations {
            db.run_migrations().await?;
            db.ensure_default_indexes().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// `(total, applied)` migration counts.
    pub async fn migration_status(&self) -> DbResult<(usize, usize)> {
        migrations::migration_status(&self.pool).await
    }

    async fn ensure_default_indexes(&self) -> DbResult<()> {
        let store = self.store();
        for fields in DEFAULT_INDEXES {
            store.ensure_index(fields).await?;
        }
        Ok(())
    }

    pub fn store(&self) -> DocumentStore {
        DocumentStore::new(self.pool.clone())
    }

    pub fn outbox(&self) -> SyncOutboxRepository {
        SyncOutboxRepository::new(self.pool.clone())
    }

    pub fn customers(&self, tenant_id: &str) -> CustomerRepository {
        CustomerRepository::new(self.store(), self.locks.clone(), tenant_id)
    }

    pub fn suppliers(&self, tenant_id: &str) -> SupplierRepository {
        SupplierRepository::new(self.store(), self.locks.clone(), tenant_id)
    }

    pub fn staff(&self, tenant_id: &str) -> StaffRepository {
        StaffRepository::new(self.store(), self.locks.clone(), tenant_id)
    }

    pub fn products(&self, tenant_id: &str) -> ProductRepository {
        ProductRepository::new(self.store(), self.locks.clone(), tenant_id)
    }

    pub fn sales(&self, tenant_id: &str) -> SaleRepository {
        SaleRepository::new(self.store(), self.locks.clone(), self.events.clone(), tenant_id)
    }

    pub fn finance(&self, tenant_id: &str) -> FinanceRepository {
        FinanceRepository::new(self.store(), self.locks.clone(), self.events.clone(), tenant_id)
    }

    pub fn reports(&self, tenant_id: &str) -> ReportRepository {
        ReportRepository::new(self.store(), self.locks.clone(), tenant_id)
    }

    /// Receives a [`LedgerEvent`] after each committed sale or restock.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Closes the pool. Every later operation fails.
    pub async fn close(&self) {
        info!("Closing document store");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (total, applied) = db.migration_status().await.unwrap();
        assert_eq!(total, applied);
        assert!(total >= 1);
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        db.run_migrations().await.unwrap();
        db.close().await;

        let reopened = Database::new(DbConfig::new(&path)).await.unwrap();
        assert!(reopened.health_check().await);
        reopened.close().await;
    }

    #[tokio::test]
    async fn test_closed_database_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(1)
            .run_migrations(false);

        assert_eq!(config.max_connections, 1);
        assert_eq!(config.min_connections, 1);
        assert!(!config.run_migrations);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }
}
