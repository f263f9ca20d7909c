//! # Document Envelope
//!
//! Every persisted record shares one envelope; the record variant's own
//! fields are flattened next to it.
//!
//! ## Wire Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  {                                                                      │
//! │    "id":         "store-1:5f0c...",   ← tenantId:uuid, client-side     │
//! │    "recordType": "customer",          ← closed set, see RecordType      │
//! │    "tenantId":   "store-1",           ← partition key                   │
//! │    "state":      "active",            ← soft delete flag                │
//! │    "createdAt":  "2024-05-01T08:30:00.000Z",                            │
//! │    "updatedAt":  "2024-05-01T08:30:00.000Z",                            │
//! │    "rev":        1,                   ← bumped by the store per write   │
//! │    "name": "Wanjiru", "phone": "0712...", ...   ← variant fields        │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ids are generated without a coordinator, so writes stay possible while
//! the node is offline and remain unique across replicas.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::time;

// =============================================================================
// Record Type
// =============================================================================

/// Discriminator stored in every document's `recordType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordType {
    Product,
    Customer,
    Sale,
    Expense,
    Transaction,
    Account,
    BalanceSheetEntry,
    Supplier,
    Staff,
    Invoice,
}

impl RecordType {
    pub const ALL: [RecordType; 10] = [
        RecordType::Product,
        RecordType::Customer,
        RecordType::Sale,
        RecordType::Expense,
        RecordType::Transaction,
        RecordType::Account,
        RecordType::BalanceSheetEntry,
        RecordType::Supplier,
        RecordType::Staff,
        RecordType::Invoice,
    ];

    /// Wire name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Product => "product",
            RecordType::Customer => "customer",
            RecordType::Sale => "sale",
            RecordType::Expense => "expense",
            RecordType::Transaction => "transaction",
            RecordType::Account => "account",
            RecordType::BalanceSheetEntry => "balanceSheetEntry",
            RecordType::Supplier => "supplier",
            RecordType::Staff => "staff",
            RecordType::Invoice => "invoice",
        }
    }

    /// Human label used in error messages ("Customer not found: ...").
    pub fn label(&self) -> &'static str {
        match self {
            RecordType::Product => "Product",
            RecordType::Customer => "Customer",
            RecordType::Sale => "Sale",
            RecordType::Expense => "Expense",
            RecordType::Transaction => "Transaction",
            RecordType::Account => "Account",
            RecordType::BalanceSheetEntry => "Balance sheet entry",
            RecordType::Supplier => "Supplier",
            RecordType::Staff => "Staff member",
            RecordType::Invoice => "Invoice",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownRecordType(s.to_string()))
    }
}

// =============================================================================
// Record State
// =============================================================================

/// Soft-delete flag. Documents are never physically removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    #[default]
    Active,
    Inactive,
}

impl RecordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::Active => "active",
            RecordState::Inactive => "inactive",
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Document
// =============================================================================

/// A persisted record: envelope plus variant body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document<T> {
    pub id: String,
    pub record_type: RecordType,
    pub tenant_id: String,
    #[serde(default)]
    pub state: RecordState,
    #[serde(with = "crate::time::rfc3339_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::time::rfc3339_millis")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub rev: i64,
    #[serde(flatten)]
    pub body: T,
}

/// A document whose body has not been interpreted.
///
/// Replication moves these around; the store validates them against their
/// `recordType` before accepting them.
pub type RawDocument = Document<Map<String, Value>>;

/// Envelope keys. Body fields with these names are ignored on patch.
pub const ENVELOPE_FIELDS: [&str; 7] = [
    "id",
    "recordType",
    "tenantId",
    "state",
    "createdAt",
    "updatedAt",
    "rev",
];

/// Generates a fresh `tenantId:uuid` identifier.
pub fn new_document_id(tenant_id: &str) -> String {
    format!("{}:{}", tenant_id, Uuid::new_v4())
}

impl<T: Entity> Document<T> {
    /// Wraps a body in a new envelope with a generated id and timestamps.
    pub fn new(tenant_id: &str, body: T) -> Self {
        let now = time::now();
        Document {
            id: new_document_id(tenant_id),
            record_type: T::RECORD_TYPE,
            tenant_id: tenant_id.to_string(),
            state: RecordState::Active,
            created_at: now,
            updated_at: now,
            rev: 0,
            body,
        }
    }
}

impl<T> Document<T> {
    pub fn is_active(&self) -> bool {
        self.state == RecordState::Active
    }

    /// Stamps `updatedAt` with the current time.
    pub fn touch(&mut self) {
        self.updated_at = time::now();
    }

    /// Marks the document inactive and stamps `updatedAt`.
    pub fn archive(&mut self) {
        self.state = RecordState::Inactive;
        self.touch();
    }
}

impl<T: Serialize> Document<T> {
    /// Full JSON representation (envelope and body).
    pub fn to_value(&self) -> CoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_raw(&self) -> CoreResult<RawDocument> {
        Ok(serde_json::from_value(self.to_value()?)?)
    }
}

impl RawDocument {
    /// Interprets the body as `T`, checking the discriminator first.
    pub fn into_typed<T: Entity>(self) -> CoreResult<Document<T>> {
        if self.record_type != T::RECORD_TYPE {
            return Err(CoreError::RecordTypeMismatch {
                expected: T::RECORD_TYPE.to_string(),
                found: self.record_type.to_string(),
            });
        }
        from_value(serde_json::to_value(self)?)
    }
}

/// Deserializes a full JSON document into a typed document.
pub fn from_value<T: DeserializeOwned>(value: Value) -> CoreResult<Document<T>> {
    Ok(serde_json::from_value(value)?)
}
