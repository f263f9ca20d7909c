//! # Finance Records
//!
//! Expenses, money movements, named accounts, explicit balance-sheet
//! entries and restock invoices.
//!
//! ## Money Movements
//! ```text
//!   source ──────── amount ────────▶ destination
//!
//!   customer → store      customer pays down credit    (deposit)
//!   store    → supplier   store pays a supplier        (withdrawal)
//!   owner    → store      capital injection            (deposit)
//!   store    → bank       banking the till             (withdrawal)
//! ```
//!
//! A movement is a deposit when money lands in the store and a withdrawal
//! when it leaves the store. Everything else is neither.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::document::RecordType;
use crate::entity::Entity;
use crate::error::{ValidationError, ValidationErrors};
use crate::validation::{
    validate_document_id, validate_non_negative, validate_optional_id, validate_positive,
    validate_required, Validator,
};

// =============================================================================
// Expense
// =============================================================================

/// Fixed expense taxonomy used by the income statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpenseCategory {
    Rent,
    Utilities,
    Salaries,
    Transport,
    Marketing,
    Supplies,
    Maintenance,
    Insurance,
    Taxes,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 10] = [
        ExpenseCategory::Rent,
        ExpenseCategory::Utilities,
        ExpenseCategory::Salaries,
        ExpenseCategory::Transport,
        ExpenseCategory::Marketing,
        ExpenseCategory::Supplies,
        ExpenseCategory::Maintenance,
        ExpenseCategory::Insurance,
        ExpenseCategory::Taxes,
        ExpenseCategory::Other,
    ];
}

/// Money spent running the shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub description: String,
    pub category: ExpenseCategory,
    pub amount: i64,
    /// Day the expense applies to. A date after the reporting window makes
    /// the expense prepaid.
    pub date: NaiveDate,
    /// Account the money came out of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_from: Option<String>,
}

impl Entity for Expense {
    const RECORD_TYPE: RecordType = RecordType::Expense;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(validate_required("description", &self.description))
            .check(validate_positive("amount", self.amount))
            .check(validate_optional_id("paidFrom", &self.paid_from));
        v.finish()
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// One end of a money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Customer,
    Store,
    Supplier,
    Bank,
    Owner,
}

/// A movement of money between two parties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub source: Party,
    pub destination: Party,
    pub amount: i64,
    #[serde(default)]
    pub description: String,
    /// Customer or supplier the movement concerns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_id: Option<String>,
    /// Store account the money moved through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Transaction {
    pub fn deposit(&self) -> i64 {
        if self.destination == Party::Store {
            self.amount
        } else {
            0
        }
    }

    pub fn withdrawal(&self) -> i64 {
        if self.source == Party::Store {
            self.amount
        } else {
            0
        }
    }

    /// A customer paying down what they owe.
    pub fn is_credit_payment(&self) -> bool {
        self.source == Party::Customer
    }

    pub fn is_supplier_payment(&self) -> bool {
        self.destination == Party::Supplier
    }
}

impl Entity for Transaction {
    const RECORD_TYPE: RecordType = RecordType::Transaction;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(validate_positive("amount", self.amount))
            .check(validate_optional_id("partyId", &self.party_id))
            .check(validate_optional_id("accountId", &self.account_id));

        if self.source == self.destination {
            v.push(ValidationError::Inconsistent {
                field: "destination".into(),
                reason: "must differ from source".into(),
            });
        }
        v.finish()
    }
}

// =============================================================================
// Account
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountKind {
    Cash,
    Bank,
    MobileMoney,
}

/// A named cash, bank or mobile-money balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    pub kind: AccountKind,
    #[serde(default)]
    pub balance: i64,
}

impl Entity for Account {
    const RECORD_TYPE: RecordType = RecordType::Account;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(validate_required("name", &self.name));
        v.finish()
    }
}

// =============================================================================
// Balance Sheet Entry
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Asset,
    Liability,
    Equity,
}

/// Fixed balance-sheet taxonomy. Each category belongs to exactly one
/// [`EntryType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BalanceCategory {
    // Assets
    Cash,
    AccountsReceivable,
    Inventory,
    PrepaidExpenses,
    OtherCurrentAsset,
    PropertyAndEquipment,
    AccumulatedDepreciation,
    OtherFixedAsset,
    // Liabilities
    AccountsPayable,
    ShortTermLoan,
    AccruedExpenses,
    OtherCurrentLiability,
    LongTermLoan,
    OtherLongTermLiability,
    // Equity
    OwnerCapital,
    RetainedEarnings,
    Drawings,
    OtherEquity,
}

impl BalanceCategory {
    pub fn entry_type(&self) -> EntryType {
        use BalanceCategory::*;
        match self {
            Cash
            | AccountsReceivable
            | Inventory
            | PrepaidExpenses
            | OtherCurrentAsset
            | PropertyAndEquipment
            | AccumulatedDepreciation
            | OtherFixedAsset => EntryType::Asset,
            AccountsPayable
            | ShortTermLoan
            | AccruedExpenses
            | OtherCurrentLiability
            | LongTermLoan
            | OtherLongTermLiability => EntryType::Liability,
            OwnerCapital | RetainedEarnings | Drawings | OtherEquity => EntryType::Equity,
        }
    }

    /// Current (short-term) assets and liabilities.
    pub fn is_current(&self) -> bool {
        use BalanceCategory::*;
        matches!(
            self,
            Cash | AccountsReceivable
                | Inventory
                | PrepaidExpenses
                | OtherCurrentAsset
                | AccountsPayable
                | ShortTermLoan
                | AccruedExpenses
                | OtherCurrentLiability
        )
    }
}

/// A manually recorded asset, liability or equity amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSheetEntry {
    pub entry_type: EntryType,
    pub category: BalanceCategory,
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity for BalanceSheetEntry {
    const RECORD_TYPE: RecordType = RecordType::BalanceSheetEntry;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(validate_non_negative("amount", self.amount));

        if self.category.entry_type() != self.entry_type {
            v.push(ValidationError::Inconsistent {
                field: "category".into(),
                reason: format!("{:?} is not a {:?} category", self.category, self.entry_type),
            });
        }
        v.finish()
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// One restocked product, quantity in base units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    pub product_id: String,
    pub quantity: i64,
    /// Cost of one base unit on this delivery.
    pub buy_price: i64,
}

/// A supplier delivery restocking several products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub supplier_id: String,
    pub lines: Vec<InvoiceLine>,
    #[serde(default)]
    pub total_amount: i64,
    /// Paid on delivery; the rest goes onto the supplier's balance.
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Invoice {
    /// `Σ quantity × buyPrice`, `None` when it does not fit an amount.
    pub fn expected_total(&self) -> Option<i64> {
        self.lines.iter().try_fold(0i64, |sum, l| {
            sum.checked_add(l.quantity.checked_mul(l.buy_price)?)
        })
    }

    /// An overflowing total is left at zero for validation to reject.
    pub fn recompute_total(&mut self) {
        self.total_amount = self.expected_total().unwrap_or_default();
    }

    /// Amount left owing to the supplier.
    pub fn outstanding(&self) -> i64 {
        self.total_amount - self.amount_paid
    }
}

impl Entity for Invoice {
    const RECORD_TYPE: RecordType = RecordType::Invoice;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(validate_document_id("supplierId", &self.supplier_id))
            .check(validate_non_negative("amountPaid", self.amount_paid));

        if self.lines.is_empty() {
            v.push(ValidationError::Required {
                field: "lines".into(),
            });
        }
        for (i, line) in self.lines.iter().enumerate() {
            let mut lv = Validator::new();
            lv.check(validate_document_id("productId", &line.product_id))
                .check(validate_positive("quantity", line.quantity))
                .check(validate_non_negative("buyPrice", line.buy_price));
            v.nested(&format!("lines[{}]", i), lv.finish());
        }

        match self.expected_total() {
            Some(expected) if expected != self.total_amount => {
                v.push(ValidationError::Inconsistent {
                    field: "totalAmount".into(),
                    reason: format!("expected {}, got {}", expected, self.total_amount),
                });
            }
            Some(_) => {}
            None => {
                v.push(ValidationError::Inconsistent {
                    field: "totalAmount".into(),
                    reason: "sum of quantity × buyPrice does not fit an amount".into(),
                });
            }
        }
        v.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(source: Party, destination: Party, amount: i64) -> Transaction {
        Transaction {
            source,
            destination,
            amount,
            description: String::new(),
            party_id: None,
            account_id: None,
            reference: None,
        }
    }

    #[test]
    fn test_deposit_and_withdrawal() {
        let paid_in = transfer(Party::Customer, Party::Store, 500);
        assert_eq!(paid_in.deposit(), 500);
        assert_eq!(paid_in.withdrawal(), 0);
        assert!(paid_in.is_credit_payment());

        let paid_out = transfer(Party::Store, Party::Supplier, 300);
        assert_eq!(paid_out.deposit(), 0);
        assert_eq!(paid_out.withdrawal(), 300);
        assert!(paid_out.is_supplier_payment());
    }

    #[test]
    fn test_transaction_validation() {
        assert!(transfer(Party::Owner, Party::Store, 1).validate().is_ok());

        let errors = transfer(Party::Store, Party::Store, 0)
            .validate()
            .unwrap_err();
        assert_eq!(errors.fields(), vec!["amount", "destination"]);
    }

    #[test]
    fn test_category_must_match_entry_type() {
        let mut entry = BalanceSheetEntry {
            entry_type: EntryType::Asset,
            category: BalanceCategory::ShortTermLoan,
            amount: 1000,
            description: None,
        };
        assert_eq!(entry.validate().unwrap_err().fields(), vec!["category"]);

        entry.entry_type = EntryType::Liability;
        assert!(entry.validate().is_ok());
        assert!(entry.category.is_current());
    }

    #[test]
    fn test_expense_amount_positive() {
        let expense = Expense {
            description: "Rent May".into(),
            category: ExpenseCategory::Rent,
            amount: 0,
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            paid_from: None,
        };
        assert_eq!(expense.validate().unwrap_err().fields(), vec!["amount"]);
        assert_eq!(
            serde_json::to_value(ExpenseCategory::Utilities).unwrap(),
            serde_json::json!("utilities")
        );
    }

    #[test]
    fn test_invoice_totals() {
        let mut invoice = Invoice {
            supplier_id: "store-1:sup".into(),
            lines: vec![
                InvoiceLine {
                    product_id: "store-1:a".into(),
                    quantity: 10,
                    buy_price: 40,
                },
                InvoiceLine {
                    product_id: "store-1:b".into(),
                    quantity: 2,
                    buy_price: 150,
                },
            ],
            total_amount: 0,
            amount_paid: 500,
            reference: None,
        };
        assert!(invoice.validate().is_err());

        invoice.recompute_total();
        assert_eq!(invoice.total_amount, 700);
        assert_eq!(invoice.outstanding(), 200);
        assert!(invoice.validate().is_ok());
    }
}
