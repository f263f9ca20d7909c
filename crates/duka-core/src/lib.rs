//! # duka-core: Pure Business Logic for Duka Ledger
//!
//! Everything in this crate is deterministic and free of I/O: the document
//! envelope, the typed record variants, field validation, selector
//! matching and the reducers that turn scanned documents into statements.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Duka Ledger Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Operation Dispatcher (apps/duka-node)              │   │
//! │  │      createSale, searchProducts, incomeStatement, ...          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         duka-db (document store, write services, scans)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ duka-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ document  │  │  entity   │  │   query   │  │  reports  │  │   │
//! │  │   │ envelope  │  │ Product   │  │ Selector  │  │  income   │  │   │
//! │  │   │ RecordType│  │ Sale, ... │  │ Matcher   │  │  balance  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`document`] - Envelope shared by every persisted record
//! - [`entity`] - Typed record variants (Product, Sale, Expense, ...)
//! - [`query`] - Selectors used by the document store
//! - [`reports`] - Income statement, balance sheet, account statement, metrics
//! - [`validation`] - Field validation helpers
//! - [`time`] - Fixed-width timestamp handling
//! - [`money`] - Overflow-checked amount totals
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: reducers take documents and return reports
//! 2. **Integer Money**: amounts are `i64` in the shop's minor currency unit
//! 3. **Validate Once**: each record variant validates itself; the store
//!    calls it at the write boundary
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod document;
pub mod entity;
pub mod error;
pub mod money;
pub mod query;
pub mod reports;
pub mod time;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use document::{Document, RawDocument, RecordState, RecordType};
pub use entity::*;
pub use error::{CoreError, CoreResult, ValidationError, ValidationErrors};
pub use query::{Condition, Matcher, Selector, SortOrder};
pub use reports::DateRange;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// First hour bucket of the hourly sales histogram (inclusive).
pub const BUSINESS_HOURS_START: u32 = 7;

/// Last hour bucket of the hourly sales histogram (inclusive).
pub const BUSINESS_HOURS_END: u32 = 22;

/// Longest range, in days, the daily sales histogram will bucket.
pub const MAX_DAILY_BUCKETS: i64 = 366;

/// Default size of top-N rankings (customers, products).
pub const DEFAULT_TOP_N: usize = 5;

/// Upper bound for any list/search limit accepted from callers.
pub const MAX_LIST_LIMIT: usize = 1000;
