//! # Finance Service
//!
//! Expenses, money movements, accounts, balance-sheet entries and supplier
//! restocks.
//!
//! ## Transaction Side Effects
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────────────────┐
//! │ transaction                  │ best-effort follow-up write              │
//! ├──────────────────────────────┼──────────────────────────────────────────┤
//! │ customer → store, partyId    │ customer.balance += amount   (payment)   │
//! │ store → supplier, partyId    │ supplier.balance -= amount   (payment)   │
//! │ accountId set                │ account.balance += deposit − withdrawal  │
//! └──────────────────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! ## Restock
//! ```text
//! record_restock(invoice)
//!   1. recompute total, validate, supplier must exist   ──► error, no writes
//!   2. put(invoice)
//!   3. per line: stock += quantity, buyPrice = line price  (per-product lock)
//!   4. supplier.balance += total − paid
//!   → RestockOutcome lists what was and wasn't applied
//! ```

use serde::Serialize;
use tracing::{info, warn};

use duka_core::{
    Account, BalanceSheetEntry, Customer, DateRange, Document, Entity, Expense, Invoice, Party,
    Product, SortOrder, Supplier, Transaction,
};

use super::{add_to, clamp_limit, Collection};
use crate::error::DbResult;
use crate::events::{EventBus, LedgerEvent};
use crate::locks::KeyedLocks;
use crate::store::DocumentStore;

/// What a restock managed to apply.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockOutcome {
    pub invoice: Document<Invoice>,
    pub updated_products: Vec<String>,
    pub failed_products: Vec<String>,
    pub supplier_balance_updated: bool,
}

impl RestockOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_products.is_empty() && self.supplier_balance_updated
    }
}

#[derive(Debug, Clone)]
pub struct FinanceRepository {
    expenses: Collection<Expense>,
    transactions: Collection<Transaction>,
    accounts: Collection<Account>,
    entries: Collection<BalanceSheetEntry>,
    invoices: Collection<Invoice>,
    customers: Collection<Customer>,
    suppliers: Collection<Supplier>,
    products: Collection<Product>,
    events: EventBus,
}

impl FinanceRepository {
    pub fn new(store: DocumentStore, locks: KeyedLocks, events: EventBus, tenant_id: &str) -> Self {
        FinanceRepository {
            expenses: Collection::new(store.clone(), locks.clone(), tenant_id),
            transactions: Collection::new(store.clone(), locks.clone(), tenant_id),
            accounts: Collection::new(store.clone(), locks.clone(), tenant_id),
            entries: Collection::new(store.clone(), locks.clone(), tenant_id),
            invoices: Collection::new(store.clone(), locks.clone(), tenant_id),
            customers: Collection::new(store.clone(), locks.clone(), tenant_id),
            suppliers: Collection::new(store.clone(), locks.clone(), tenant_id),
            products: Collection::new(store, locks, tenant_id),
            events,
        }
    }

    // =========================================================================
    // Expenses
    // =========================================================================

    pub async fn create_expense(&self, expense: Expense) -> DbResult<Document<Expense>> {
        let doc = self.expenses.create(expense).await?;
        info!(
            expense_id = %doc.id,
            category = ?doc.body.category,
            amount = doc.body.amount,
            "Expense recorded"
        );
        Ok(doc)
    }

    pub async fn update_expense(&self, id: &str, expense: Expense) -> DbResult<Document<Expense>> {
        self.expenses.update(id, expense).await
    }

    pub async fn archive_expense(&self, id: &str) -> DbResult<Document<Expense>> {
        self.expenses.archive(id).await
    }

    /// Active expenses recorded within the range.
    pub async fn list_expenses(&self, range: &DateRange) -> DbResult<Vec<Document<Expense>>> {
        self.expenses.in_range(range).await
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Records a money movement and applies its balance side effects.
    pub async fn create_transaction(
        &self,
        transaction: Transaction,
    ) -> DbResult<Document<Transaction>> {
        let doc = self.transactions.create(transaction).await?;
        let t = &doc.body;

        match (t.source, t.destination, t.party_id.as_deref()) {
            (Party::Customer, Party::Store, Some(customer_id)) => {
                if let Err(e) = self.customers.adjust_balance(customer_id, t.amount).await {
                    warn!(transaction_id = %doc.id, customer_id, error = %e, "Customer balance update failed");
                }
            }
            (Party::Store, Party::Supplier, Some(supplier_id)) => {
                if let Err(e) = self.suppliers.adjust_balance(supplier_id, -t.amount).await {
                    warn!(transaction_id = %doc.id, supplier_id, error = %e, "Supplier balance update failed");
                }
            }
            _ => {}
        }

        if let Some(account_id) = t.account_id.as_deref() {
            let delta = t.deposit() - t.withdrawal();
            if delta != 0 {
                let result = self
                    .accounts
                    .modify(account_id, |account| {
                        account.balance = add_to("balance", account.balance, delta)?;
                        Ok(())
                    })
                    .await;
                if let Err(e) = result {
                    warn!(transaction_id = %doc.id, account_id, error = %e, "Account balance update failed");
                }
            }
        }

        info!(
            transaction_id = %doc.id,
            source = ?t.source,
            destination = ?t.destination,
            amount = t.amount,
            "Transaction recorded"
        );
        Ok(doc)
    }

    pub async fn list_transactions(&self, range: &DateRange) -> DbResult<Vec<Document<Transaction>>> {
        self.transactions.in_range(range).await
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    pub async fn create_account(&self, account: Account) -> DbResult<Document<Account>> {
        self.accounts.create(account).await
    }

    pub async fn update_account(&self, id: &str, account: Account) -> DbResult<Document<Account>> {
        self.accounts.update(id, account).await
    }

    /// Active accounts by name.
    pub async fn list_accounts(&self) -> DbResult<Vec<Document<Account>>> {
        let selector = self
            .accounts
            .selector()
            .active()
            .sort_by("name", SortOrder::Asc)
            .limit(clamp_limit(None));
        self.accounts.find(&selector).await
    }

    // =========================================================================
    // Balance-Sheet Entries
    // =========================================================================

    pub async fn create_entry(&self, entry: BalanceSheetEntry) -> DbResult<Document<BalanceSheetEntry>> {
        self.entries.create(entry).await
    }

    pub async fn update_entry(
        &self,
        id: &str,
        entry: BalanceSheetEntry,
    ) -> DbResult<Document<BalanceSheetEntry>> {
        self.entries.update(id, entry).await
    }

    pub async fn archive_entry(&self, id: &str) -> DbResult<Document<BalanceSheetEntry>> {
        self.entries.archive(id).await
    }

    pub async fn list_entries(&self) -> DbResult<Vec<Document<BalanceSheetEntry>>> {
        self.entries.list(None).await
    }

    // =========================================================================
    // Restock
    // =========================================================================

    /// Stores a supplier invoice and applies it to stock and the supplier's
    /// balance. Steps after the invoice write are independent; the outcome
    /// says which ones failed.
    pub async fn record_restock(&self, mut invoice: Invoice) -> DbResult<RestockOutcome> {
        invoice.recompute_total();
        invoice.validate()?;
        self.suppliers.get(&invoice.supplier_id).await?;

        let doc = self.invoices.create(invoice).await?;

        let mut updated_products = Vec::new();
        let mut failed_products = Vec::new();
        for line in &doc.body.lines {
            match self
                .products
                .receive_stock(&line.product_id, line.quantity, line.buy_price)
                .await
            {
                Ok(_) => updated_products.push(line.product_id.clone()),
                Err(e) => {
                    warn!(invoice_id = %doc.id, product_id = %line.product_id, error = %e, "Restock line not applied");
                    failed_products.push(line.product_id.clone());
                }
            }
        }

        let outstanding = doc.body.outstanding();
        let supplier_balance_updated = if outstanding == 0 {
            true
        } else {
            match self
                .suppliers
                .adjust_balance(&doc.body.supplier_id, outstanding)
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    warn!(invoice_id = %doc.id, error = %e, "Supplier balance not updated for restock");
                    false
                }
            }
        };

        info!(
            invoice_id = %doc.id,
            total = doc.body.total_amount,
            updated = updated_products.len(),
            failed = failed_products.len(),
            "Restock recorded"
        );

        self.events.publish(LedgerEvent::RestockRecorded {
            tenant_id: doc.tenant_id.clone(),
            invoice: doc.clone(),
            updated_products: updated_products.clone(),
        });

        Ok(RestockOutcome {
            invoice: doc,
            updated_products,
            failed_products,
            supplier_balance_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::repository::test_support::*;
    use chrono::Utc;
    use duka_core::*;

    fn transfer(source: Party, destination: Party, amount: i64) -> Transaction {
        Transaction {
            source,
            destination,
            amount,
            description: "test".into(),
            party_id: None,
            account_id: None,
            reference: None,
        }
    }

    fn rent(amount: i64) -> Expense {
        Expense {
            description: "Shop rent".into(),
            category: ExpenseCategory::Rent,
            amount,
            date: Utc::now().date_naive(),
            paid_from: None,
        }
    }

    #[tokio::test]
    async fn test_expense_lifecycle() {
        let db = db().await;
        let finance = db.finance(TENANT);

        let created = finance.create_expense(rent(15_000)).await.unwrap();
        let today = DateRange::day(created.created_at.date_naive());
        assert_eq!(finance.list_expenses(&today).await.unwrap().len(), 1);

        let updated = finance.update_expense(&created.id, rent(16_000)).await.unwrap();
        assert_eq!(updated.body.amount, 16_000);

        finance.archive_expense(&created.id).await.unwrap();
        assert!(finance.list_expenses(&today).await.unwrap().is_empty());

        let err = finance.create_expense(rent(0)).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_customer_payment_raises_balance_and_account() {
        let db = db().await;
        let finance = db.finance(TENANT);
        let mut owing = customer("Amina", true);
        owing.balance = -500;
        let amina = db.customers(TENANT).create(owing).await.unwrap();
        let till = finance
            .create_account(Account {
                name: "Till".into(),
                kind: AccountKind::MobileMoney,
                balance: 0,
            })
            .await
            .unwrap();

        let mut payment = transfer(Party::Customer, Party::Store, 300);
        payment.party_id = Some(amina.id.clone());
        payment.account_id = Some(till.id.clone());
        finance.create_transaction(payment).await.unwrap();

        assert_eq!(db.customers(TENANT).get(&amina.id).await.unwrap().body.balance, -200);
        let accounts = finance.list_accounts().await.unwrap();
        assert_eq!(accounts[0].body.balance, 300);
    }

    #[tokio::test]
    async fn test_supplier_payment_lowers_balance() {
        let db = db().await;
        let finance = db.finance(TENANT);
        let mut owed = supplier("Bidco");
        owed.balance = 1_000;
        let bidco = db.suppliers(TENANT).create(owed).await.unwrap();

        let mut payment = transfer(Party::Store, Party::Supplier, 400);
        payment.party_id = Some(bidco.id.clone());
        let recorded = finance.create_transaction(payment).await.unwrap();

        assert_eq!(db.suppliers(TENANT).get(&bidco.id).await.unwrap().body.balance, 600);
        let today = DateRange::day(recorded.created_at.date_naive());
        assert_eq!(finance.list_transactions(&today).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transaction_with_unknown_party_is_still_recorded() {
        let db = db().await;
        let finance = db.finance(TENANT);

        let mut payment = transfer(Party::Customer, Party::Store, 100);
        payment.party_id = Some("s1:nobody".into());
        let recorded = finance.create_transaction(payment).await.unwrap();
        assert_eq!(recorded.body.amount, 100);
    }

    #[tokio::test]
    async fn test_balance_sheet_entries() {
        let db = db().await;
        let finance = db.finance(TENANT);

        let loan = finance
            .create_entry(BalanceSheetEntry {
                entry_type: EntryType::Liability,
                category: BalanceCategory::LongTermLoan,
                amount: 50_000,
                description: Some("Equipment loan".into()),
            })
            .await
            .unwrap();
        assert_eq!(finance.list_entries().await.unwrap().len(), 1);

        let mismatched = BalanceSheetEntry {
            entry_type: EntryType::Asset,
            category: BalanceCategory::LongTermLoan,
            amount: 1,
            description: None,
        };
        assert!(finance.update_entry(&loan.id, mismatched).await.is_err());

        finance.archive_entry(&loan.id).await.unwrap();
        assert!(finance.list_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restock_applies_lines_and_supplier_balance() {
        let db = db().await;
        let finance = db.finance(TENANT);
        let bidco = db.suppliers(TENANT).create(supplier("Bidco")).await.unwrap();
        let oil = db.products(TENANT).create(product("Oil", 2)).await.unwrap();

        let outcome = finance
            .record_restock(Invoice {
                supplier_id: bidco.id.clone(),
                lines: vec![
                    InvoiceLine {
                        product_id: oil.id.clone(),
                        quantity: 10,
                        buy_price: 90,
                    },
                    InvoiceLine {
                        product_id: "s1:discontinued".into(),
                        quantity: 1,
                        buy_price: 50,
                    },
                ],
                total_amount: 0,
                amount_paid: 450,
                reference: Some("INV-001".into()),
            })
            .await
            .unwrap();

        assert_eq!(outcome.invoice.body.total_amount, 950);
        assert_eq!(outcome.updated_products, vec![oil.id.clone()]);
        assert_eq!(outcome.failed_products, vec!["s1:discontinued".to_string()]);
        assert!(outcome.supplier_balance_updated);
        assert!(!outcome.is_complete());

        let oil = db.products(TENANT).get(&oil.id).await.unwrap();
        assert_eq!(oil.body.stock, 12);
        assert_eq!(oil.body.buy_price, 90);
        assert_eq!(db.suppliers(TENANT).get(&bidco.id).await.unwrap().body.balance, 500);
    }

    #[tokio::test]
    async fn test_restock_unknown_supplier_writes_nothing() {
        let db = db().await;
        let oil = db.products(TENANT).create(product("Oil", 2)).await.unwrap();

        let err = db
            .finance(TENANT)
            .record_restock(Invoice {
                supplier_id: "s1:unknown".into(),
                lines: vec![InvoiceLine {
                    product_id: oil.id.clone(),
                    quantity: 10,
                    buy_price: 90,
                }],
                total_amount: 0,
                amount_paid: 0,
                reference: None,
            })
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(db.products(TENANT).get(&oil.id).await.unwrap().body.stock, 2);
    }
}
