//! # Duka Node
//!
//! The process each till or back-office machine runs.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Duka Node Process                              │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  OperationServer (axum)   POST /operations                       │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Dispatcher ──▶ duka-db services ──▶ SQLite (WAL)                │  │
//! │  │      │                 │                                         │  │
//! │  │      │           LedgerEvent bus ──▶ receipt worker ──▶ spool    │  │
//! │  │      │                                                           │  │
//! │  │      └── syncStatus ◀── watch ◀── ReplicationEngine ──▶ replica  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  Optional HubServer: serves this node's store to the other nodes       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`dispatcher`] - Closed operation set and the result envelope
//! - [`server`] - HTTP carrier for operations
//! - [`session`] - Caller identity passed with every call
//! - [`receipt`] - Receipt formatting and the spool printer
//! - [`probe`] - Connectivity check
//! - [`config`] - Node configuration
//! - [`error`] - `ApiError` and error codes

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod probe;
pub mod receipt;
pub mod server;
pub mod session;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use duka_db::{Database, DbConfig};
use duka_sync::{EngineSettings, HttpReplica, HubServer, ReplicationEngine};

pub use config::NodeConfig;
pub use dispatcher::{Dispatcher, Operation, OperationName, Response};
pub use error::{ApiError, ErrorCode};
pub use probe::{Connectivity, ConnectivityProbe};
pub use receipt::{format_receipt, spawn_receipt_worker, ReceiptPrinter, SpoolPrinter};
pub use server::{OperationServer, ServerHandle};
pub use session::Session;

/// Initializes tracing. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,duka=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Starts every component, waits for a shutdown signal, then stops them.
pub async fn run(config: NodeConfig) -> anyhow::Result<()> {
    // Store
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create data directory {}", parent.display()))?;
    }
    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("cannot open store at {}", db_path.display()))?;
    info!(
        path = %db_path.display(),
        tenant = %config.sync.tenant_id(),
        "Store opened"
    );

    // Hub
    let hub = if config.sync.hub.enabled {
        Some(
            HubServer::new(config.sync.hub.clone(), db.clone())
                .start()
                .await
                .context("cannot start replica hub")?,
        )
    } else {
        None
    };

    // Replication
    let probe = ConnectivityProbe::new(
        config.probe_url().map(str::to_string),
        config.probe.timeout(),
    );
    let mut dispatcher = Dispatcher::new(db.clone()).with_probe(probe);

    let replication = match config.sync.remote_url() {
        Some(url) if config.sync.is_enabled() => {
            let replica = HttpReplica::new(
                url,
                config.sync.replication.credential.clone(),
                config.sync.replication.request_timeout(),
            )
            .context("invalid replica url")?;
            let engine = ReplicationEngine::new(
                db.clone(),
                Arc::new(replica),
                EngineSettings::from_config(&config.sync),
            );
            let handle = engine.start();
            dispatcher =
                dispatcher.with_replication(handle.subscribe(), config.sync.replication.max_attempts);
            Some(handle)
        }
        _ => {
            info!(mode = %config.sync.mode(), "Replication engine not started");
            None
        }
    };

    // Receipts
    let receipts = config.receipts.spool_dir.clone().map(|dir| {
        info!(dir = %dir.display(), "Receipts spooled to directory");
        spawn_receipt_worker(
            db.subscribe(),
            Arc::new(SpoolPrinter::new(dir)),
            config.sync.store.name.clone(),
        )
    });

    // Operations
    let server = OperationServer::new(config.server.clone(), dispatcher)
        .start()
        .await
        .with_context(|| format!("cannot bind {}", config.server.bind_address()))?;

    info!(url = %server.url(), "Duka node ready");
    shutdown_signal().await;

    server.shutdown().await;
    if let Some(handle) = replication {
        if let Err(e) = handle.stop().await {
            warn!(error = %e, "Replication engine did not stop cleanly");
        }
    }
    if let Some(hub) = hub {
        if let Err(e) = hub.shutdown().await {
            warn!(error = %e, "Replica hub did not stop cleanly");
        }
    }
    if let Some(worker) = receipts {
        worker.abort();
    }
    db.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
