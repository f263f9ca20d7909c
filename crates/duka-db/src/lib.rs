//! # duka-db: Document Store for Duka Ledger
//!
//! SQLite-backed document store, the write services built on it and the
//! scans behind every report.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Duka Ledger Data Flow                            │
//! │                                                                         │
//! │  Operation (createSale)           Replication engine (duka-sync)       │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     duka-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌───────────────┐   ┌──────────────────┐  │   │
//! │  │   │  repository  │──▶│     store     │◀──│  outbox + feed   │  │   │
//! │  │   │ Sale, Finance│   │ put/get/find  │   │ pending, changes │  │   │
//! │  │   │ Collection<T>│   │ apply_remote  │   │ cursors          │  │   │
//! │  │   └──────┬───────┘   └───────┬───────┘   └──────────────────┘  │   │
//! │  │          │ events            │                                  │   │
//! │  │          ▼                   ▼                                  │   │
//! │  │     EventBus           SqlitePool (WAL) + migrations            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and the [`Database`] handle
//! - [`store`] - Generic document put/get/find, LWW merge, change feed
//! - [`repository`] - Write services and report scans
//! - [`events`] - Post-commit ledger events
//! - [`locks`] - Per-document async locks
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use duka_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("ledger.db")).await?;
//! let customer = db.customers("shop-1").create(input).await?;
//! let units = db.products("shop-1").search_units("soda", Some(20)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod events;
pub mod locks;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use events::{EventBus, LedgerEvent};
pub use pool::{Database, DbConfig};
pub use store::{Ack, ApplyOutcome, ChangeBatch, DocumentStore};

pub use repository::finance::{FinanceRepository, RestockOutcome};
pub use repository::party::{CustomerRepository, StaffRepository, SupplierRepository};
pub use repository::product::ProductRepository;
pub use repository::reports::ReportRepository;
pub use repository::sale::SaleRepository;
pub use repository::sync::{OutboxEntry, SyncOutboxRepository};
pub use repository::{Collection, Searchable};
