//! Account statement: transactions in chronological order with a running
//! balance, plus the customer-payment and supplier-payment buckets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::entity::{Party, Transaction};
use crate::error::CoreResult;
use crate::money;
use crate::reports::DateRange;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementRow {
    pub id: String,
    #[serde(with = "crate::time::rfc3339_millis")]
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub source: Party,
    pub destination: Party,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub amount: i64,
    pub deposit: i64,
    pub withdrawal: i64,
    /// `Σ (deposit − withdrawal)` up to and including this row.
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatement {
    pub period: DateRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub rows: Vec<StatementRow>,
    pub total_deposits: i64,
    pub total_withdrawals: i64,
    pub closing_balance: i64,
    /// Payments received from customers.
    pub credits_paid: Vec<StatementRow>,
    pub total_credits_paid: i64,
    pub supplier_payments: Vec<StatementRow>,
    pub total_supplier_payments: i64,
}

/// Builds the statement. With `account_id` set, only transactions moving
/// through that account are included. A balance or total too large for an
/// amount fails the statement.
pub fn account_statement(
    period: &DateRange,
    account_id: Option<&str>,
    transactions: &[Document<Transaction>],
) -> CoreResult<AccountStatement> {
    let mut selected: Vec<&Document<Transaction>> = transactions
        .iter()
        .filter(|t| match account_id {
            Some(id) => t.body.account_id.as_deref() == Some(id),
            None => true,
        })
        .collect();
    selected.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    let mut running = 0i64;
    let mut rows = Vec::with_capacity(selected.len());
    for doc in selected {
        let t = &doc.body;
        running = money::sub(
            "balance",
            money::add("balance", running, t.deposit())?,
            t.withdrawal(),
        )?;
        rows.push(StatementRow {
            id: doc.id.clone(),
            created_at: doc.created_at,
            description: t.description.clone(),
            source: t.source,
            destination: t.destination,
            party_id: t.party_id.clone(),
            reference: t.reference.clone(),
            amount: t.amount,
            deposit: t.deposit(),
            withdrawal: t.withdrawal(),
            balance: running,
        });
    }

    let credits_paid: Vec<StatementRow> = rows
        .iter()
        .filter(|r| r.source == Party::Customer)
        .cloned()
        .collect();
    let supplier_payments: Vec<StatementRow> = rows
        .iter()
        .filter(|r| r.destination == Party::Supplier)
        .cloned()
        .collect();

    Ok(AccountStatement {
        period: *period,
        account_id: account_id.map(str::to_string),
        total_deposits: money::total("totalDeposits", rows.iter().map(|r| r.deposit))?,
        total_withdrawals: money::total("totalWithdrawals", rows.iter().map(|r| r.withdrawal))?,
        closing_balance: running,
        total_credits_paid: money::total(
            "totalCreditsPaid",
            credits_paid.iter().map(|r| r.amount),
        )?,
        total_supplier_payments: money::total(
            "totalSupplierPayments",
            supplier_payments.iter().map(|r| r.amount),
        )?,
        credits_paid,
        supplier_payments,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::fixtures::*;

    #[test]
    fn test_running_balance_in_chronological_order() {
        let mut late = transfer(Party::Store, Party::Supplier, 300);
        late.created_at = at(2024, 5, 2, 15, 0);
        let mut early = transfer(Party::Customer, Party::Store, 1_000);
        early.created_at = at(2024, 5, 2, 9, 0);
        let mut middle = transfer(Party::Owner, Party::Store, 200);
        middle.created_at = at(2024, 5, 2, 12, 0);

        let range = DateRange::day(date(2024, 5, 2));
        let s = account_statement(&range, None, &[late, early, middle]).unwrap();

        let balances: Vec<i64> = s.rows.iter().map(|r| r.balance).collect();
        assert_eq!(balances, vec![1_000, 1_200, 900]);
        assert_eq!(s.closing_balance, 900);
        assert_eq!(s.total_deposits - s.total_withdrawals, s.closing_balance);
        assert_eq!(s.total_credits_paid, 1_000);
        assert_eq!(s.total_supplier_payments, 300);
        assert_eq!(s.credits_paid.len(), 1);
    }

    #[test]
    fn test_account_filter() {
        let mut banked = transfer(Party::Store, Party::Bank, 700);
        banked.body.account_id = Some("s1:till".into());
        let other = transfer(Party::Owner, Party::Store, 50);

        let range = DateRange::day(date(2024, 5, 2));
        let s = account_statement(&range, Some("s1:till"), &[banked, other]).unwrap();
        assert_eq!(s.rows.len(), 1);
        assert_eq!(s.closing_balance, -700);
    }

    #[test]
    fn test_empty_statement() {
        let s = account_statement(&DateRange::day(date(2024, 5, 2)), None, &[]).unwrap();
        assert!(s.rows.is_empty());
        assert_eq!(s.closing_balance, 0);
    }
}
