//! # Replicas
//!
//! A [`Replica`] is whatever the engine pushes to and pulls from.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Replica Implementations                        │
//! │                                                                         │
//! │  HttpReplica                         LocalReplica                       │
//! │  ───────────                         ────────────                       │
//! │  • reqwest client, bearer auth       • another Database in process     │
//! │  • talks to a HubServer              • backs the hub's handlers        │
//! │  • per-request timeout               • can be switched offline (tests) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, warn};
use url::Url;

use duka_core::RawDocument;
use duka_db::{ApplyOutcome, Database, DbError, DocumentStore};

use crate::error::{ReplicationError, ReplicationResult};
use crate::protocol::{
    ChangeBatch, ErrorBody, PushAck, PushRequest, Rejection, CHANGES_PATH, HEALTH_PATH,
    MAX_PAGE_SIZE, PUSH_PATH,
};

// =============================================================================
// Replica Trait
// =============================================================================

#[async_trait]
pub trait Replica: Send + Sync {
    /// Offers documents to the replica.
    async fn push(&self, docs: Vec<RawDocument>) -> ReplicationResult<PushAck>;

    /// Documents of `tenant_id` the replica saw after `since`.
    async fn pull(&self, tenant_id: &str, since: i64, limit: u32) -> ReplicationResult<ChangeBatch>;

    /// Cheap reachability check.
    async fn ping(&self) -> ReplicationResult<()>;

    /// Human-readable target, for logs and status.
    fn describe(&self) -> String;
}

/// Merges pushed documents into `store`.
///
/// Documents that fail validation are rejected one by one; any other store
/// failure aborts the push so the sender retries it whole.
pub async fn accept_push(store: &DocumentStore, docs: Vec<RawDocument>) -> ReplicationResult<PushAck> {
    let mut ack = PushAck::default();

    for doc in docs {
        match store.apply_remote(&doc).await {
            Ok(ApplyOutcome::Applied) | Ok(ApplyOutcome::Skipped) => ack.accepted.push(doc.id),
            Err(err @ (DbError::Validation(_) | DbError::Rejected(_) | DbError::Serialization(_))) => {
                warn!(id = %doc.id, error = %err, "Rejecting replicated document");
                ack.rejected.push(Rejection {
                    id: doc.id,
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        }
    }

    debug!(
        accepted = ack.accepted.len(),
        rejected = ack.rejected.len(),
        "Push merged"
    );
    Ok(ack)
}

// =============================================================================
// HTTP Replica
// =============================================================================

/// Client for a [`HubServer`](crate::hub::HubServer).
#[derive(Debug, Clone)]
pub struct HttpReplica {
    client: Client,
    base: Url,
    credential: Option<String>,
}

impl HttpReplica {
    pub fn new(
        base_url: &str,
        credential: Option<String>,
        timeout: Duration,
    ) -> ReplicationResult<Self> {
        let mut base = Url::parse(base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ReplicationError::InvalidUrl(format!(
                "expected http or https, got {}",
                base.scheme()
            )));
        }
        // Url::join replaces the last segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReplicationError::InvalidConfig(e.to_string()))?;

        Ok(HttpReplica {
            client,
            base,
            credential,
        })
    }

    fn endpoint(&self, path: &str) -> ReplicationResult<Url> {
        Ok(self.base.join(path)?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credential {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Turns non-success statuses into errors, keeping the hub's message.
    async fn check(response: Response) -> ReplicationResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ReplicationError::Unauthorized);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.message)
            .unwrap_or(text);
        Err(ReplicationError::Remote {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Replica for HttpReplica {
    async fn push(&self, docs: Vec<RawDocument>) -> ReplicationResult<PushAck> {
        let url = self.endpoint(PUSH_PATH)?;
        let count = docs.len();
        let response = self
            .authorize(self.client.post(url))
            .json(&PushRequest { docs })
            .send()
            .await?;

        let ack: PushAck = Self::check(response).await?.json().await?;
        debug!(sent = count, accepted = ack.accepted.len(), "Pushed to hub");
        Ok(ack)
    }

    async fn pull(&self, tenant_id: &str, since: i64, limit: u32) -> ReplicationResult<ChangeBatch> {
        let url = self.endpoint(CHANGES_PATH)?;
        let limit = limit.clamp(1, MAX_PAGE_SIZE).to_string();
        let since = since.to_string();
        let response = self
            .authorize(self.client.get(url))
            .query(&[
                ("tenant", tenant_id),
                ("since", since.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    async fn ping(&self) -> ReplicationResult<()> {
        let url = self.endpoint(HEALTH_PATH)?;
        let response = self.client.get(url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.base.to_string()
    }
}

// =============================================================================
// Local Replica
// =============================================================================

/// A replica backed by a [`Database`] in the same process.
#[derive(Debug, Clone)]
pub struct LocalReplica {
    db: Database,
    name: String,
    online: Arc<AtomicBool>,
}

impl LocalReplica {
    pub fn new(db: Database, name: impl Into<String>) -> Self {
        LocalReplica {
            db,
            name: name.into(),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulates losing or regaining the connection.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn ensure_online(&self) -> ReplicationResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(ReplicationError::ConnectionFailed(format!(
                "{} is unreachable",
                self.name
            )))
        }
    }
}

#[async_trait]
impl Replica for LocalReplica {
    async fn push(&self, docs: Vec<RawDocument>) -> ReplicationResult<PushAck> {
        self.ensure_online()?;
        accept_push(&self.db.store(), docs).await
    }

    async fn pull(&self, tenant_id: &str, since: i64, limit: u32) -> ReplicationResult<ChangeBatch> {
        self.ensure_online()?;
        Ok(self
            .db
            .store()
            .changes_since(tenant_id, since, limit.clamp(1, MAX_PAGE_SIZE))
            .await?)
    }

    async fn ping(&self) -> ReplicationResult<()> {
        self.ensure_online()
    }

    fn describe(&self) -> String {
        format!("local:{}", self.name)
    }
}
