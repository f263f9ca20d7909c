//! # Receipts
//!
//! Receipt printing hangs off the ledger event bus, never off the sale
//! write itself. A sale is stored first; the printer hears about it later
//! and a printing failure is only logged.
//!
//! ```text
//! SaleRepository::create ──commit──▶ EventBus ──SaleRecorded──▶ receipt worker
//!                                                                    │
//!                                                           format_receipt
//!                                                                    │
//!                                                         ReceiptPrinter::print
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use duka_core::{Document, PaymentMethod, Sale};
use duka_db::LedgerEvent;

const WIDTH: usize = 40;

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("Spool write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Printer unavailable: {0}")]
    Unavailable(String),
}

/// Something that can put a receipt on paper.
#[async_trait]
pub trait ReceiptPrinter: Send + Sync {
    async fn print(&self, sale_id: &str, text: &str) -> Result<(), ReceiptError>;
}

// =============================================================================
// Spool Printer
// =============================================================================

/// Drops each receipt as a text file for the host's printer driver.
#[derive(Debug, Clone)]
pub struct SpoolPrinter {
    dir: PathBuf,
}

impl SpoolPrinter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SpoolPrinter { dir: dir.into() }
    }

    /// Spool file for a sale; `:` is not portable in file names.
    pub fn path_for(&self, sale_id: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", sale_id.replace(':', "_")))
    }
}

#[async_trait]
impl ReceiptPrinter for SpoolPrinter {
    async fn print(&self, sale_id: &str, text: &str) -> Result<(), ReceiptError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(sale_id);
        tokio::fs::write(&path, text).await?;
        debug!(path = ?path, "Receipt spooled");
        Ok(())
    }
}

// =============================================================================
// Formatting
// =============================================================================

fn payment_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "CASH",
        PaymentMethod::Mpesa => "M-PESA",
        PaymentMethod::Credit => "CREDIT",
    }
}

fn line(left: &str, right: &str) -> String {
    let pad = WIDTH.saturating_sub(left.chars().count() + right.chars().count()).max(1);
    format!("{}{}{}\n", left, " ".repeat(pad), right)
}

/// Plain-text receipt, 40 columns wide.
pub fn format_receipt(store_name: &str, sale: &Document<Sale>) -> String {
    let rule = "-".repeat(WIDTH);
    let mut out = String::new();

    out.push_str(&format!("{:^width$}\n", store_name, width = WIDTH));
    out.push_str(&format!(
        "{:^width$}\n",
        sale.created_at.format("%Y-%m-%d %H:%M").to_string(),
        width = WIDTH
    ));
    out.push_str(&rule);
    out.push('\n');

    for item in &sale.body.items {
        out.push_str(&format!("{}\n", item.name));
        out.push_str(&line(
            &format!("  {} x {}", item.quantity, item.unit_price),
            &item.subtotal.to_string(),
        ));
    }

    out.push_str(&rule);
    out.push('\n');
    out.push_str(&line("ITEMS", &sale.body.total_items.to_string()));
    out.push_str(&line("TOTAL", &sale.body.total_amount.to_string()));
    out.push_str(&line("PAID BY", payment_label(sale.body.payment_method)));
    if let Some(reference) = &sale.body.mpesa_reference {
        out.push_str(&line("M-PESA REF", reference));
    }
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!("{:^width$}\n", "Asante kwa kununua!", width = WIDTH));
    out
}

// =============================================================================
// Worker
// =============================================================================

/// Prints a receipt for every recorded sale until the bus closes.
pub fn spawn_receipt_worker(
    mut events: broadcast::Receiver<LedgerEvent>,
    printer: Arc<dyn ReceiptPrinter>,
    store_name: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Receipt worker started");
        loop {
            match events.recv().await {
                Ok(LedgerEvent::SaleRecorded { sale, .. }) => {
                    let text = format_receipt(&store_name, &sale);
                    if let Err(e) = printer.print(&sale.id, &text).await {
                        warn!(sale_id = %sale.id, error = %e, "Receipt printing failed");
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Receipt worker fell behind, receipts skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        info!("Receipt worker stopped");
    })
}
