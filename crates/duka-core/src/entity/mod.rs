//! # Record Variants
//!
//! One Rust type per `recordType`. Each implements [`Entity`], which ties
//! the type to its discriminator and gives it a single `validate()` that
//! the document store runs at the write boundary.
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────────────────┐
//! │ recordType       │ type                                                 │
//! ├──────────────────┼──────────────────────────────────────────────────────┤
//! │ product          │ Product (+ Variant)                                  │
//! │ customer         │ Customer                                             │
//! │ supplier         │ Supplier                                             │
//! │ staff            │ Staff                                                │
//! │ sale             │ Sale (+ SaleItem)                                    │
//! │ expense          │ Expense                                              │
//! │ transaction      │ Transaction                                          │
//! │ account          │ Account                                              │
//! │ balanceSheetEntry│ BalanceSheetEntry                                    │
//! │ invoice          │ Invoice (+ InvoiceLine)                              │
//! └──────────────────┴──────────────────────────────────────────────────────┘
//! ```

mod finance;
mod party;
mod product;
mod sale;

pub use finance::{
    Account, AccountKind, BalanceCategory, BalanceSheetEntry, EntryType, Expense,
    ExpenseCategory, Invoice, InvoiceLine, Party, Transaction,
};
pub use party::{Customer, CustomerStatus, Staff, StaffRole, Supplier};
pub use product::{Product, SellableUnit, Variant};
pub use sale::{FulfillmentType, PaymentMethod, Sale, SaleItem, SaleType};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::document::{Document, RecordType};
use crate::error::{CoreError, CoreResult, ValidationErrors};

/// A typed record variant.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Discriminator written to `recordType`.
    const RECORD_TYPE: RecordType;

    /// Checks every field, reporting all failures at once.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Validates a full JSON document against the variant named by its
/// `recordType`.
///
/// Used for documents that arrive untyped (replication, patches).
pub fn validate_value(record_type: RecordType, value: &Value) -> CoreResult<()> {
    fn check<T: Entity>(value: &Value) -> CoreResult<()> {
        let doc: Document<T> = serde_json::from_value(value.clone())?;
        doc.body.validate().map_err(CoreError::from)
    }

    match record_type {
        RecordType::Product => check::<Product>(value),
        RecordType::Customer => check::<Customer>(value),
        RecordType::Sale => check::<Sale>(value),
        RecordType::Expense => check::<Expense>(value),
        RecordType::Transaction => check::<Transaction>(value),
        RecordType::Account => check::<Account>(value),
        RecordType::BalanceSheetEntry => check::<BalanceSheetEntry>(value),
        RecordType::Supplier => check::<Supplier>(value),
        RecordType::Staff => check::<Staff>(value),
        RecordType::Invoice => check::<Invoice>(value),
    }
}
