//! # Replication Engine
//!
//! Background task that drains the outbox to a [`Replica`] and merges the
//! replica's change feed back into the local store.
//!
//! ## Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         One Replication Cycle                           │
//! │                                                                         │
//! │  PUSH (repeat while a full batch was sent)                             │
//! │  ─────────────────────────────────────────                             │
//! │  1. pending(tenant, batch_size, max_attempts)                          │
//! │  2. load the CURRENT copy of each distinct document                    │
//! │  3. replica.push(docs)                                                 │
//! │  4. accepted ──▶ mark_synced   rejected ──▶ mark_failed                │
//! │     network error ──▶ nothing marked, whole cycle retried              │
//! │                                                                         │
//! │  PULL (repeat while a full page came back)                             │
//! │  ─────────────────────────────────────────                             │
//! │  1. cursor = sync_state["pull:<tenant>"]                               │
//! │  2. replica.pull(tenant, cursor, batch_size)                           │
//! │  3. apply_remote each doc (last-write-wins, never re-enters outbox)    │
//! │  4. persist cursor = lastSeq                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Task States
//! ```text
//!   Idle ──tick/trigger──▶ Syncing ──ok──▶ Idle
//!                             │
//!                             └──error──▶ Backoff ──delay──▶ Syncing
//!   any ──stop()──▶ Stopped
//! ```
//!
//! The task only reads and writes through the store, so local writes never
//! wait for it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use duka_db::{ApplyOutcome, Database, DbError, OutboxEntry};

use crate::config::{ReplicationSettings, SyncConfig};
use crate::error::{ReplicationError, ReplicationResult};
use crate::protocol::PushAck;
use crate::replica::Replica;

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationState {
    /// Replication is switched off for this node.
    Disabled,
    Idle,
    Syncing,
    /// The last cycle failed; waiting before the next attempt.
    Backoff,
    Stopped,
}

impl std::fmt::Display for ReplicationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicationState::Disabled => write!(f, "disabled"),
            ReplicationState::Idle => write!(f, "idle"),
            ReplicationState::Syncing => write!(f, "syncing"),
            ReplicationState::Backoff => write!(f, "backoff"),
            ReplicationState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Snapshot published on every state change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationStatus {
    pub state: ReplicationState,
    pub remote: Option<String>,
    /// Outbox entries not yet acknowledged.
    pub pending: i64,
    /// Outbox entries that ran out of attempts.
    pub stalled: i64,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub pushed_total: u64,
    pub pulled_total: u64,
}

impl ReplicationStatus {
    pub fn disabled() -> Self {
        ReplicationStatus {
            state: ReplicationState::Disabled,
            remote: None,
            pending: 0,
            stalled: 0,
            last_sync: None,
            last_error: None,
            pushed_total: 0,
            pulled_total: 0,
        }
    }

    fn starting(remote: String) -> Self {
        ReplicationStatus {
            state: ReplicationState::Idle,
            remote: Some(remote),
            ..Self::disabled()
        }
    }
}

/// What one cycle moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// Documents acknowledged by the replica.
    pub pushed: usize,
    /// Documents the replica refused.
    pub rejected: usize,
    /// Pulled documents that changed the local store.
    pub applied: usize,
    /// Pulled documents the local store already had (or newer).
    pub skipped: usize,
}

impl CycleReport {
    pub fn is_empty(&self) -> bool {
        *self == CycleReport::default()
    }
}

// =============================================================================
// Observer
// =============================================================================

/// Receives change and error notifications from the running engine.
pub trait ReplicationObserver: Send + Sync {
    fn on_status(&self, status: &ReplicationStatus);

    fn on_cycle(&self, report: &CycleReport);

    fn on_error(&self, error: &ReplicationError);
}

pub struct NoOpObserver;

impl ReplicationObserver for NoOpObserver {
    fn on_status(&self, _status: &ReplicationStatus) {}
    fn on_cycle(&self, _report: &CycleReport) {}
    fn on_error(&self, _error: &ReplicationError) {}
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub tenant_id: String,
    pub batch_size: u32,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl EngineSettings {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self::from_settings(tenant_id, &ReplicationSettings::default())
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::from_settings(config.tenant_id(), &config.replication)
    }

    fn from_settings(tenant_id: impl Into<String>, settings: &ReplicationSettings) -> Self {
        EngineSettings {
            tenant_id: tenant_id.into(),
            batch_size: settings.batch_size.max(1),
            poll_interval: settings.poll_interval(),
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: settings.initial_backoff(),
            max_backoff: settings.max_backoff(),
        }
    }

    pub fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    fn cursor_key(&self) -> String {
        format!("pull:{}", self.tenant_id)
    }
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Clone)]
pub struct ReplicationEngine {
    db: Database,
    replica: Arc<dyn Replica>,
    settings: Arc<EngineSettings>,
    observer: Arc<dyn ReplicationObserver>,
}

impl ReplicationEngine {
    pub fn new(db: Database, replica: Arc<dyn Replica>, settings: EngineSettings) -> Self {
        Self::with_observer(db, replica, settings, Arc::new(NoOpObserver))
    }

    pub fn with_observer(
        db: Database,
        replica: Arc<dyn Replica>,
        settings: EngineSettings,
        observer: Arc<dyn ReplicationObserver>,
    ) -> Self {
        ReplicationEngine {
            db,
            replica,
            settings: Arc::new(settings),
            observer,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs one push-then-pull cycle.
    pub async fn run_once(&self) -> ReplicationResult<CycleReport> {
        let mut report = CycleReport::default();
        self.push_pending(&mut report).await?;
        self.pull_changes(&mut report).await?;

        if !report.is_empty() {
            info!(
                tenant_id = %self.settings.tenant_id,
                pushed = report.pushed,
                rejected = report.rejected,
                applied = report.applied,
                skipped = report.skipped,
                "Replication cycle complete"
            );
        }
        Ok(report)
    }

    async fn push_pending(&self, report: &mut CycleReport) -> ReplicationResult<()> {
        let outbox = self.db.outbox();
        let store = self.db.store();
        let settings = &self.settings;

        loop {
            let entries = outbox
                .pending(&settings.tenant_id, settings.batch_size, settings.max_attempts)
                .await?;
            if entries.is_empty() {
                return Ok(());
            }

            let groups = group_by_document(&entries);
            let mut docs = Vec::with_capacity(groups.len());
            let mut missing = Vec::new();
            for (doc_id, _) in &groups {
                match store.get(doc_id).await {
                    Ok(doc) => docs.push(doc),
                    Err(e) if e.is_not_found() => missing.push(doc_id.clone()),
                    Err(e) => return Err(e.into()),
                }
            }

            let ack = if docs.is_empty() {
                PushAck::default()
            } else {
                self.replica.push(docs).await?
            };

            let mut synced = Vec::new();
            let mut progressed = false;
            for (doc_id, group) in &groups {
                let reason = if missing.contains(doc_id) {
                    Some("document no longer exists locally")
                } else {
                    ack.rejection(doc_id)
                };

                if let Some(reason) = reason {
                    for entry in group {
                        outbox.mark_failed(entry.id, reason).await?;
                        if entry.attempts + 1 >= settings.max_attempts as i64 {
                            error!(
                                doc_id = %doc_id,
                                outbox_id = entry.id,
                                reason,
                                "Outbox entry exhausted its attempts; no longer pushed"
                            );
                        }
                    }
                    report.rejected += 1;
                    progressed = true;
                } else if ack.accepted.iter().any(|id| id == doc_id) {
                    synced.extend(group.iter().map(|e| e.id));
                    report.pushed += 1;
                    progressed = true;
                } else {
                    warn!(doc_id = %doc_id, "Replica neither accepted nor rejected document");
                }
            }

            outbox.mark_synced(&synced).await?;

            if !progressed || entries.len() < settings.batch_size as usize {
                return Ok(());
            }
        }
    }

    async fn pull_changes(&self, report: &mut CycleReport) -> ReplicationResult<()> {
        let outbox = self.db.outbox();
        let store = self.db.store();
        let settings = &self.settings;
        let key = settings.cursor_key();
        let mut cursor = outbox.get_cursor(&key).await?;

        loop {
            let batch = self
                .replica
                .pull(&settings.tenant_id, cursor, settings.batch_size)
                .await?;
            let count = batch.docs.len();

            for doc in &batch.docs {
                if doc.tenant_id != settings.tenant_id {
                    warn!(id = %doc.id, tenant_id = %doc.tenant_id, "Ignoring document of another tenant");
                    continue;
                }
                match store.apply_remote(doc).await {
                    Ok(ApplyOutcome::Applied) => report.applied += 1,
                    Ok(ApplyOutcome::Skipped) => report.skipped += 1,
                    Err(e @ (DbError::Validation(_) | DbError::Serialization(_))) => {
                        warn!(id = %doc.id, error = %e, "Ignoring invalid replicated document");
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            if batch.last_seq <= cursor {
                return Ok(());
            }
            cursor = batch.last_seq;
            outbox.set_cursor(&key, cursor).await?;
            debug!(cursor, pulled = count, "Pull cursor advanced");

            if count < settings.batch_size as usize {
                return Ok(());
            }
        }
    }

    /// Spawns the background task.
    pub fn start(self) -> ReplicationHandle {
        let (status_tx, status_rx) = watch::channel(ReplicationStatus::starting(self.replica.describe()));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let trigger = Arc::new(Notify::new());

        info!(
            tenant_id = %self.settings.tenant_id,
            remote = %self.replica.describe(),
            interval = ?self.settings.poll_interval,
            "Starting replication engine"
        );

        let task = tokio::spawn(self.run(status_tx, trigger.clone(), shutdown_rx));

        ReplicationHandle {
            status_rx,
            trigger,
            shutdown_tx,
            task,
        }
    }

    async fn run(
        self,
        status_tx: watch::Sender<ReplicationStatus>,
        trigger: Arc<Notify>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut backoff = self.create_backoff();

        loop {
            self.publish(&status_tx, |s| s.state = ReplicationState::Syncing);

            let wait = match self.run_once().await {
                Ok(report) => {
                    backoff.reset();
                    let (pending, stalled) = self.queue_depth().await;
                    self.observer.on_cycle(&report);
                    self.publish(&status_tx, |s| {
                        s.state = ReplicationState::Idle;
                        s.last_sync = Some(Utc::now());
                        s.last_error = None;
                        s.pushed_total += report.pushed as u64;
                        s.pulled_total += report.applied as u64;
                        s.pending = pending;
                        s.stalled = stalled;
                    });
                    self.settings.poll_interval
                }
                Err(e) => {
                    let retryable = e.is_retryable();
                    warn!(error = %e, retryable, "Replication cycle failed");
                    self.observer.on_error(&e);
                    let (pending, stalled) = self.queue_depth().await;
                    self.publish(&status_tx, |s| {
                        s.state = ReplicationState::Backoff;
                        s.last_error = Some(e.to_string());
                        s.pending = pending;
                        s.stalled = stalled;
                    });
                    if retryable {
                        backoff.next_backoff().unwrap_or(self.settings.max_backoff)
                    } else {
                        self.settings.poll_interval
                    }
                }
            };

            debug!(?wait, "Waiting for next replication cycle");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = trigger.notified() => debug!("Replication triggered"),
                _ = shutdown_rx.recv() => break,
            }
        }

        self.publish(&status_tx, |s| s.state = ReplicationState::Stopped);
        info!("Replication engine stopped");
    }

    async fn queue_depth(&self) -> (i64, i64) {
        let outbox = self.db.outbox();
        let tenant = &self.settings.tenant_id;
        let pending = outbox.count_pending(tenant).await.unwrap_or_default();
        let stalled = outbox
            .count_stalled(tenant, self.settings.max_attempts)
            .await
            .unwrap_or_default();
        (pending, stalled)
    }

    fn publish<F>(&self, status_tx: &watch::Sender<ReplicationStatus>, change: F)
    where
        F: FnOnce(&mut ReplicationStatus),
    {
        status_tx.send_modify(change);
        let snapshot = status_tx.borrow().clone();
        self.observer.on_status(&snapshot);
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.settings.initial_backoff,
            max_interval: self.settings.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Outbox entries grouped by document, in first-seen order.
fn group_by_document(entries: &[OutboxEntry]) -> Vec<(String, Vec<&OutboxEntry>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<&OutboxEntry>)> = Vec::new();
    for entry in entries {
        match index.get(entry.doc_id.as_str()) {
            Some(&i) => groups[i].1.push(entry),
            None => {
                index.insert(&entry.doc_id, groups.len());
                groups.push((entry.doc_id.clone(), vec![entry]));
            }
        }
    }
    groups
}

// =============================================================================
// Handle
// =============================================================================

/// Controls a running engine.
pub struct ReplicationHandle {
    status_rx: watch::Receiver<ReplicationStatus>,
    trigger: Arc<Notify>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ReplicationHandle {
    pub fn status(&self) -> ReplicationStatus {
        self.status_rx.borrow().clone()
    }

    /// Receiver that sees every status change.
    pub fn subscribe(&self) -> watch::Receiver<ReplicationStatus> {
        self.status_rx.clone()
    }

    /// Starts the next cycle without waiting for the poll interval.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Stops the task and waits for it to finish.
    pub async fn stop(self) -> ReplicationResult<()> {
        info!("Stopping replication engine");
        if self.shutdown_tx.send(()).await.is_err() {
            debug!("Replication task already gone");
        }
        self.task.await.map_err(|e| {
            error!(error = %e, "Replication task ended abnormally");
            ReplicationError::ShuttingDown
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ChangeBatch, Rejection};
    use crate::replica::LocalReplica;
    use async_trait::async_trait;
    use duka_core::{Customer, CustomerStatus, RawDocument};
    use duka_db::DbConfig;

    const TENANT: &str = "s1";

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

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn engine(node: &Database, replica: Arc<dyn Replica>) -> ReplicationEngine {
        ReplicationEngine::new(node.clone(), replica, EngineSettings::new(TENANT).batch_size(2))
    }

    /// Refuses every document it is offered.
    struct RejectingReplica;

    #[async_trait]
    impl Replica for RejectingReplica {
        async fn push(&self, docs: Vec<RawDocument>) -> ReplicationResult<PushAck> {
            Ok(PushAck {
                accepted: vec![],
                rejected: docs
                    .into_iter()
                    .map(|d| Rejection { id: d.id, reason: "refused".into() })
                    .collect(),
            })
        }

        async fn pull(&self, _: &str, since: i64, _: u32) -> ReplicationResult<ChangeBatch> {
            Ok(ChangeBatch { docs: vec![], last_seq: since })
        }

        async fn ping(&self) -> ReplicationResult<()> {
            Ok(())
        }

        fn describe(&self) -> String {
            "rejecting".into()
        }
    }

    #[tokio::test]
    async fn test_push_marks_outbox_synced() {
        let (node, hub) = (db().await, db().await);
        let customers = node.customers(TENANT);
        let amina = customers.create(customer("Amina")).await.unwrap();
        customers.adjust_balance(&amina.id, -50).await.unwrap();
        for name in ["B", "C", "D"] {
            customers.create(customer(name)).await.unwrap();
        }

        let replica = Arc::new(LocalReplica::new(hub.clone(), "hub"));
        let report = engine(&node, replica).run_once().await.unwrap();

        assert_eq!(report.pushed, 4);
        assert_eq!(node.outbox().count_pending(TENANT).await.unwrap(), 0);
        let copy = hub.customers(TENANT).get(&amina.id).await.unwrap();
        assert_eq!(copy.rev, 2);
        assert_eq!(copy.body.balance, -50);
    }

    #[tokio::test]
    async fn test_unreachable_replica_leaves_outbox_untouched() {
        let (node, hub) = (db().await, db().await);
        node.customers(TENANT).create(customer("Amina")).await.unwrap();

        let replica = Arc::new(LocalReplica::new(hub, "hub"));
        replica.set_online(false);
        let err = engine(&node, replica).run_once().await.unwrap_err();

        assert!(err.is_retryable());
        let pending = node.outbox().pending(TENANT, 10, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_rejected_documents_stall_after_max_attempts() {
        let node = db().await;
        node.customers(TENANT).create(customer("Amina")).await.unwrap();

        let engine = ReplicationEngine::new(
            node.clone(),
            Arc::new(RejectingReplica),
            EngineSettings::new(TENANT).max_attempts(2),
        );

        assert_eq!(engine.run_once().await.unwrap().rejected, 1);
        assert_eq!(engine.run_once().await.unwrap().rejected, 1);
        assert_eq!(engine.run_once().await.unwrap().rejected, 0);
        assert_eq!(node.outbox().count_stalled(TENANT, 2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pull_applies_changes_and_persists_cursor() {
        let (node, hub) = (db().await, db().await);
        for name in ["A", "B", "C"] {
            hub.customers(TENANT).create(customer(name)).await.unwrap();
        }
        hub.customers("s2").create(customer("Other shop")).await.unwrap();

        let engine = engine(&node, Arc::new(LocalReplica::new(hub, "hub")));
        let first = engine.run_once().await.unwrap();
        assert_eq!(first.applied, 3);
        assert_eq!(node.customers(TENANT).list(None).await.unwrap().len(), 3);
        assert!(node.customers("s2").list(None).await.unwrap().is_empty());
        assert!(node.outbox().get_cursor("pull:s1").await.unwrap() > 0);

        // Pulled documents are not pushed back
        assert_eq!(node.outbox().count_pending(TENANT).await.unwrap(), 0);

        let second = engine.run_once().await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_background_task_reports_status() {
        let (node, hub) = (db().await, db().await);
        node.customers(TENANT).create(customer("Amina")).await.unwrap();

        let settings = EngineSettings::new(TENANT).poll_interval(Duration::from_secs(3600));
        let handle =
            ReplicationEngine::new(node.clone(), Arc::new(LocalReplica::new(hub.clone(), "hub")), settings)
                .start();

        let mut rx = handle.subscribe();
        let status = tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.last_sync.is_some()),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(status.pushed_total, 1);
        assert_eq!(status.pending, 0);
        assert_eq!(status.remote.as_deref(), Some("local:hub"));

        node.customers(TENANT).create(customer("Juma")).await.unwrap();
        handle.trigger();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.pushed_total == 2))
            .await
            .unwrap()
            .unwrap();

        let rx = handle.subscribe();
        handle.stop().await.unwrap();
        assert_eq!(rx.borrow().state, ReplicationState::Stopped);
        assert_eq!(hub.customers(TENANT).list(None).await.unwrap().len(), 2);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ReplicationState::Backoff.to_string(), "backoff");
        assert_eq!(ReplicationStatus::disabled().state, ReplicationState::Disabled);
    }
}
