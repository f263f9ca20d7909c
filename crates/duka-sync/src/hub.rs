//! # Replica Hub Server
//!
//! Serves the replica API from a node's own database, so any node can be
//! the remote for the others.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Replica Hub Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      HubServer (Axum)                           │   │
//! │  │                                                                 │   │
//! │  │  POST /replica/push ──▶ bearer check ──▶ accept_push            │   │
//! │  │                                           (apply_remote, LWW)   │   │
//! │  │  GET  /replica/changes ──▶ bearer check ──▶ changes_since       │   │
//! │  │  GET  /health ──▶ "OK"                                          │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │          ▲                     ▲                     ▲                  │
//! │   ┌──────┴─────┐        ┌──────┴─────┐        ┌──────┴─────┐           │
//! │   │ Till #1    │        │ Till #2    │        │ Back office│           │
//! │   │ HttpReplica│        │ HttpReplica│        │ HttpReplica│           │
//! │   └────────────┘        └────────────┘        └────────────┘           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Documents pushed to the hub land in its change feed, so they reach every
//! other node on its next pull. They never enter the hub's own outbox.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use duka_db::Database;

use crate::config::HubSettings;
use crate::error::{ReplicationError, ReplicationResult};
use crate::protocol::{ChangeBatch, ChangesQuery, ErrorBody, PushAck, PushRequest, MAX_PAGE_SIZE};
use crate::replica::accept_push;

// =============================================================================
// Hub State
// =============================================================================

struct HubState {
    db: Database,
    credential: Option<String>,
}

impl HubState {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), HubError> {
        let Some(expected) = &self.credential else {
            return Ok(());
        };
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented == Some(expected.as_str()) {
            Ok(())
        } else {
            Err(HubError::Unauthorized)
        }
    }
}

// =============================================================================
// Hub Server
// =============================================================================

pub struct HubServer {
    settings: HubSettings,
    state: Arc<HubState>,
}

/// Handle for a running hub.
#[derive(Clone)]
pub struct HubHandle {
    local_addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
}

impl HubHandle {
    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL clients should use.
    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub async fn shutdown(&self) -> ReplicationResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| ReplicationError::ShuttingDown)
    }
}

impl HubServer {
    pub fn new(settings: HubSettings, db: Database) -> Self {
        let state = Arc::new(HubState {
            db,
            credential: settings.credential.clone(),
        });
        HubServer { settings, state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/replica/push", post(push_handler))
            .route("/replica/changes", get(changes_handler))
            .route("/health", get(health_handler))
            .with_state(self.state.clone())
    }

    /// Binds the listener and serves in a spawned task.
    pub async fn start(self) -> ReplicationResult<HubHandle> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let app = self.router();
        let bind_addr = self.settings.bind_address();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ReplicationError::Bind {
                addr: bind_addr.clone(),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| ReplicationError::Bind {
            addr: bind_addr.clone(),
            reason: e.to_string(),
        })?;

        info!(addr = %local_addr, "Replica hub started");

        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await;
                    info!("Replica hub shutting down");
                })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "Replica hub stopped with error");
            }
        });

        Ok(HubHandle {
            local_addr,
            shutdown_tx,
        })
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_handler() -> impl IntoResponse {
    "OK"
}

async fn push_handler(
    State(state): State<Arc<HubState>>,
    headers: HeaderMap,
    Json(request): Json<PushRequest>,
) -> Result<Json<PushAck>, HubError> {
    state.authorize(&headers)?;
    debug!(docs = request.docs.len(), "Push received");
    let ack = accept_push(&state.db.store(), request.docs).await?;
    Ok(Json(ack))
}

async fn changes_handler(
    State(state): State<Arc<HubState>>,
    headers: HeaderMap,
    Query(query): Query<ChangesQuery>,
) -> Result<Json<ChangeBatch>, HubError> {
    state.authorize(&headers)?;
    if query.tenant.trim().is_empty() {
        return Err(HubError::BadRequest("tenant is required".into()));
    }

    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let batch = state
        .db
        .store()
        .changes_since(&query.tenant, query.since, limit)
        .await
        .map_err(ReplicationError::from)?;
    Ok(Json(batch))
}

// =============================================================================
// Errors
// =============================================================================

enum HubError {
    Unauthorized,
    BadRequest(String),
    Internal(ReplicationError),
}

impl From<ReplicationError> for HubError {
    fn from(err: ReplicationError) -> Self {
        HubError::Internal(err)
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            HubError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "missing or wrong credential".to_string(),
            ),
            HubError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
            HubError::Internal(err) => {
                warn!(error = %err, "Replica request failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_ERROR",
                    err.to_string(),
                )
            }
        };
        let body = ErrorBody {
            code: code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::{HttpReplica, Replica};
    use duka_core::{Customer, CustomerStatus, Document};
    use duka_db::DbConfig;
    use std::time::Duration;

    fn local_settings(credential: Option<&str>) -> HubSettings {
        HubSettings {
            enabled: true,
            bind_addr: "127.0.0.1".into(),
            port: 0,
            credential: credential.map(str::to_string),
        }
    }

    fn customer(name: &str) -> Customer {
        Customer {
            name: name.into(),
            phone: "0712345678".into(),
            email: None,
            address: None,
            balance: 0,
            credit_eligible: false,
            status: CustomerStatus::Good,
        }
    }

    #[tokio::test]
    async fn test_push_and_pull_over_http() {
        let hub_db = Database::new(DbConfig::in_memory()).await.unwrap();
        let hub = HubServer::new(local_settings(Some("secret")), hub_db.clone())
            .start()
            .await
            .unwrap();

        let client =
            HttpReplica::new(&hub.url(), Some("secret".into()), Duration::from_secs(5)).unwrap();
        client.ping().await.unwrap();

        let doc = Document::new("s1", customer("Amina")).to_raw().unwrap();
        let ack = client.push(vec![doc.clone()]).await.unwrap();
        assert_eq!(ack.accepted, vec![doc.id.clone()]);

        let batch = client.pull("s1", 0, 10).await.unwrap();
        assert_eq!(batch.docs.len(), 1);
        assert_eq!(batch.docs[0].id, doc.id);
        assert!(batch.last_seq > 0);

        let empty = client.pull("s1", batch.last_seq, 10).await.unwrap();
        assert!(empty.docs.is_empty());
        assert_eq!(empty.last_seq, batch.last_seq);

        hub.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_credential_is_refused() {
        let hub_db = Database::new(DbConfig::in_memory()).await.unwrap();
        let hub = HubServer::new(local_settings(Some("secret")), hub_db)
            .start()
            .await
            .unwrap();

        let client =
            HttpReplica::new(&hub.url(), Some("guess".into()), Duration::from_secs(5)).unwrap();
        // Health stays open
        client.ping().await.unwrap();

        let err = client.pull("s1", 0, 10).await.unwrap_err();
        assert!(matches!(err, ReplicationError::Unauthorized));
        assert!(!err.is_retryable());

        hub.shutdown().await.unwrap();
    }
}
