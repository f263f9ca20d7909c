//! # Replica Wire Protocol
//!
//! JSON bodies exchanged between a node and a replica hub.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NODE                                          HUB                     │
//! │                                                                         │
//! │  POST /replica/push      { docs: [RawDocument] }                       │
//! │        ──────────────────────────────────────────▶                      │
//! │        ◀──────────────────────────────────────────                      │
//! │                          { accepted: [id], rejected: [{id, reason}] }  │
//! │                                                                         │
//! │  GET /replica/changes?tenant=s1&since=42&limit=100                     │
//! │        ──────────────────────────────────────────▶                      │
//! │        ◀──────────────────────────────────────────                      │
//! │                          { docs: [RawDocument], lastSeq: 57 }          │
//! │                                                                         │
//! │  GET /health             "OK"                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `accepted` lists every id the hub now holds at least as new as the pushed
//! copy, whether or not the push changed anything. A rejected document
//! failed validation on the hub and will not be accepted as sent.

use serde::{Deserialize, Serialize};

use duka_core::RawDocument;

pub use duka_db::ChangeBatch;

/// Path of the push endpoint.
pub const PUSH_PATH: &str = "replica/push";

/// Path of the change feed endpoint.
pub const CHANGES_PATH: &str = "replica/changes";

pub const HEALTH_PATH: &str = "health";

/// Largest page the hub serves.
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushRequest {
    pub docs: Vec<RawDocument>,
}

/// Per-document answer to a push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAck {
    pub accepted: Vec<String>,
    #[serde(default)]
    pub rejected: Vec<Rejection>,
}

impl PushAck {
    pub fn is_rejected(&self, id: &str) -> bool {
        self.rejected.iter().any(|r| r.id == id)
    }

    pub fn rejection(&self, id: &str) -> Option<&str> {
        self.rejected
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.reason.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub id: String,
    pub reason: String,
}

/// Query string of the change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesQuery {
    pub tenant: String,
    #[serde(default)]
    pub since: i64,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

/// Error body returned by the hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
