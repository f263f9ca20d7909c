//! In-process ledger events.
//!
//! Write services publish after a successful write. Subscribers (receipt
//! printing, UI refresh) run on their own tasks; a slow or missing
//! subscriber never fails the write.

use tokio::sync::broadcast;
use tracing::debug;

use duka_core::{Document, Invoice, Sale};

#[derive(Debug, Clone)]
pub enum LedgerEvent {
    /// A sale was stored (stock and balance updates already attempted).
    SaleRecorded {
        tenant_id: String,
        sale: Document<Sale>,
    },
    /// A restock invoice was stored and applied to products.
    RestockRecorded {
        tenant_id: String,
        invoice: Document<Invoice>,
        updated_products: Vec<String>,
    },
}

impl LedgerEvent {
    pub fn tenant_id(&self) -> &str {
        match self {
            LedgerEvent::SaleRecorded { tenant_id, .. }
            | LedgerEvent::RestockRecorded { tenant_id, .. } => tenant_id,
        }
    }
}

/// Broadcast channel shared by every clone of a `Database`.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        EventBus { tx }
    }

    /// Publishes to current subscribers. Returns how many received it.
    pub fn publish(&self, event: LedgerEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Ledger event dropped (no subscribers)");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx.subscribe()
    }
}
