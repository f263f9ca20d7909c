//! Shared fixtures for the replication integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use duka_core::{Customer, CustomerStatus, Product, RawDocument};
use duka_db::{Database, DbConfig};
use duka_sync::{EngineSettings, LocalReplica, Replica, ReplicationEngine};
use tempfile::TempDir;

pub const TENANT: &str = "kariakoo";

/// A node with a file-backed database.
pub struct TestNode {
    pub db: Database,
    pub _dir: TempDir,
}

impl TestNode {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("ledger.db")))
            .await
            .expect("failed to open node database");
        TestNode { db, _dir: dir }
    }

    pub fn engine(&self, replica: Arc<dyn Replica>) -> ReplicationEngine {
        ReplicationEngine::new(self.db.clone(), replica, EngineSettings::new(TENANT).batch_size(3))
    }

    /// Every document of the tenant, keyed by id, as JSON.
    pub async fn snapshot(&self) -> BTreeMap<String, serde_json::Value> {
        let batch = self.db.store().changes_since(TENANT, 0, 10_000).await.unwrap();
        batch
            .docs
            .into_iter()
            .map(|doc| (doc.id.clone(), doc.to_value().unwrap()))
            .collect()
    }
}

pub async fn hub() -> (Database, Arc<LocalReplica>) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let replica = Arc::new(LocalReplica::new(db.clone(), "hub"));
    (db, replica)
}

pub fn customer(name: &str) -> Customer {
    Customer {
        name: name.into(),
        phone: "0712345678".into(),
        email: None,
        address: None,
        balance: 0,
        credit_eligible: true,
        status: CustomerStatus::Good,
    }
}

pub fn product(name: &str, stock: i64) -> Product {
    Product {
        name: name.into(),
        sku: None,
        barcode: None,
        category: Some("Grocery".into()),
        base_unit: "piece".into(),
        buy_price: 80,
        unit_price: 100,
        stock,
        reorder_level: None,
        variants: vec![],
    }
}

pub fn ids(docs: &[RawDocument]) -> Vec<String> {
    docs.iter().map(|d| d.id.clone()).collect()
}
