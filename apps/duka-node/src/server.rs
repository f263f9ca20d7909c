//! # Operation Endpoint
//!
//! Carries the operation contract over HTTP for host shells that run out of
//! process.
//!
//! ```text
//! POST /operations   { "session": {..}, "operation": "createSale", "args": [..] }
//!                    ──▶ 200 { "success": true, "data": .. }
//!                    ──▶ 200 { "success": false, "error": { code, message, detail } }
//! GET  /health       ──▶ "OK"
//! ```
//!
//! Operation failures are still HTTP 200: the envelope carries them.

use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::ServerSettings;
use crate::dispatcher::{Dispatcher, Response};
use crate::error::ApiError;
use crate::session::Session;

/// Body of `POST /operations`.
#[derive(Debug, Deserialize)]
pub struct OperationRequest {
    pub session: Session,
    pub operation: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

pub struct OperationServer {
    settings: ServerSettings,
    dispatcher: Dispatcher,
}

/// Handle for a running endpoint.
#[derive(Clone)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub async fn shutdown(&self) {
        if self.shutdown_tx.send(()).await.is_err() {
            warn!("Operation endpoint already stopped");
        }
    }
}

impl OperationServer {
    pub fn new(settings: ServerSettings, dispatcher: Dispatcher) -> Self {
        OperationServer {
            settings,
            dispatcher,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/operations", post(operation_handler))
            .route("/health", get(health_handler))
            .with_state(self.dispatcher.clone())
    }

    /// Binds the listener and serves in a spawned task.
    pub async fn start(self) -> std::io::Result<ServerHandle> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let app = self.router();
        let listener = TcpListener::bind(self.settings.bind_address()).await?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "Operation endpoint started");

        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await;
                    info!("Operation endpoint shutting down");
                })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "Operation endpoint stopped with error");
            }
        });

        Ok(ServerHandle {
            local_addr,
            shutdown_tx,
        })
    }
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}

async fn operation_handler(
    State(dispatcher): State<Dispatcher>,
    request: Result<Json<OperationRequest>, JsonRejection>,
) -> Json<Response> {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => {
            return Json(Response::err(ApiError::validation(format!(
                "Malformed operation request: {}",
                rejection.body_text()
            ))));
        }
    };

    Json(
        dispatcher
            .dispatch(&request.session, &request.operation, request.args)
            .await,
    )
}
