//! # duka-sync: Replication Engine for Duka Ledger
//!
//! Keeps each node's document store converging with a remote replica while
//! every local write completes against the local store alone.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Replication Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 ReplicationEngine (spawned task)                 │  │
//! │  │                                                                  │  │
//! │  │  push outbox ──▶ Replica ──▶ pull change feed ──▶ apply (LWW)    │  │
//! │  │  status on a watch channel, errors to the observer, backoff      │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┴─────────────────────┐                  │
//! │         ▼                                           ▼                   │
//! │  ┌────────────────┐                        ┌────────────────────────┐  │
//! │  │  HttpReplica   │ ── HTTP/JSON ────────▶ │  HubServer (axum)      │  │
//! │  │  (reqwest)     │                        │  backed by a Database  │  │
//! │  └────────────────┘                        └────────────────────────┘  │
//! │  ┌────────────────┐                                                    │
//! │  │  LocalReplica  │  in-process Database (tests, embedded hub)         │
//! │  └────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`engine`] - `ReplicationEngine`, status and observer
//! - [`replica`] - `Replica` trait, HTTP and local implementations
//! - [`hub`] - Replica API server
//! - [`protocol`] - Wire types
//! - [`config`] - Store, replication and hub settings
//! - [`error`] - Replication error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use duka_sync::{EngineSettings, HttpReplica, ReplicationEngine, SyncConfig};
//!
//! let config = SyncConfig::load(None)?;
//! let replica = HttpReplica::new(url, config.replication.credential.clone(), timeout)?;
//! let handle = ReplicationEngine::new(db, Arc::new(replica), EngineSettings::from_config(&config)).start();
//! println!("{}", handle.status().state);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod replica;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{HubSettings, ReplicationMode, ReplicationSettings, StoreConfig, SyncConfig};
pub use engine::{
    CycleReport, EngineSettings, NoOpObserver, ReplicationEngine, ReplicationHandle,
    ReplicationObserver, ReplicationState, ReplicationStatus,
};
pub use error::{ReplicationError, ReplicationResult};
pub use hub::{HubHandle, HubServer};
pub use protocol::{ChangeBatch, PushAck, Rejection};
pub use replica::{accept_push, HttpReplica, LocalReplica, Replica};
