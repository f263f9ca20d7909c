//! Income statement.
//!
//! ```text
//! cash + mpesa + credit          = totalSales
//! totalSales − cogs              = grossProfit
//! grossProfit − Σ expenses       = netIncome
//! ```
//!
//! A figure too large for an amount fails the statement rather than
//! reporting a wrapped number.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::entity::{Expense, ExpenseCategory, PaymentMethod, Sale};
use crate::error::{CoreError, CoreResult};
use crate::money;
use crate::reports::DateRange;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeStatement {
    pub period: DateRange,
    pub cash_sales: i64,
    pub mpesa_sales: i64,
    pub credit_sales: i64,
    pub total_sales: i64,
    pub sale_count: usize,
    pub cogs: i64,
    pub gross_profit: i64,
    /// Every category is present, zero when nothing was spent on it.
    pub expenses: BTreeMap<ExpenseCategory, i64>,
    pub total_expenses: i64,
    pub net_income: i64,
}

pub fn income_statement(
    period: &DateRange,
    sales: &[Document<Sale>],
    expenses: &[Document<Expense>],
) -> CoreResult<IncomeStatement> {
    let (mut cash_sales, mut mpesa_sales, mut credit_sales) = (0i64, 0i64, 0i64);
    let mut cogs = 0i64;

    for sale in sales {
        let (figure, bucket) = match sale.body.payment_method {
            PaymentMethod::Cash => ("cashSales", &mut cash_sales),
            PaymentMethod::Mpesa => ("mpesaSales", &mut mpesa_sales),
            PaymentMethod::Credit => ("creditSales", &mut credit_sales),
        };
        money::accumulate(figure, bucket, sale.body.total_amount)?;
        let sale_cogs = sale.body.cogs().ok_or_else(|| CoreError::AmountOverflow {
            figure: "cogs".into(),
        })?;
        money::accumulate("cogs", &mut cogs, sale_cogs)?;
    }

    let mut by_category: BTreeMap<ExpenseCategory, i64> =
        ExpenseCategory::ALL.into_iter().map(|c| (c, 0)).collect();
    for expense in expenses {
        let bucket = by_category.entry(expense.body.category).or_insert(0);
        money::accumulate("expenses", bucket, expense.body.amount)?;
    }
    let total_expenses = money::total("totalExpenses", by_category.values().copied())?;

    let total_sales = money::total("totalSales", [cash_sales, mpesa_sales, credit_sales])?;
    let gross_profit = money::sub("grossProfit", total_sales, cogs)?;

    Ok(IncomeStatement {
        period: *period,
        cash_sales,
        mpesa_sales,
        credit_sales,
        total_sales,
        sale_count: sales.len(),
        cogs,
        gross_profit,
        expenses: by_category,
        total_expenses,
        net_income: money::sub("netIncome", gross_profit, total_expenses)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::fixtures::{date, expense, sale};

    fn period() -> DateRange {
        DateRange::day(date(2024, 5, 1))
    }

    #[test]
    fn test_income_statement_identity() {
        let sales = vec![
            sale(PaymentMethod::Cash, 100, 60, 2),
            sale(PaymentMethod::Mpesa, 250, 200, 1),
            sale(PaymentMethod::Credit, 50, 30, 4),
        ];
        let day = date(2024, 5, 1);
        let expenses = vec![
            expense(ExpenseCategory::Rent, 120, day),
            expense(ExpenseCategory::Transport, 30, day),
            expense(ExpenseCategory::Rent, 10, day),
        ];
        let s = income_statement(&period(), &sales, &expenses).unwrap();

        assert_eq!((s.cash_sales, s.mpesa_sales, s.credit_sales), (200, 250, 200));
        assert_eq!(s.total_sales, s.cash_sales + s.mpesa_sales + s.credit_sales);
        assert_eq!(s.cogs, 120 + 200 + 120);
        assert_eq!(s.expenses[&ExpenseCategory::Rent], 130);
        assert_eq!(s.total_expenses, 160);
        assert_eq!(
            s.net_income,
            (s.cash_sales + s.mpesa_sales + s.credit_sales) - s.cogs - s.total_expenses
        );
        assert_eq!(s.sale_count, 3);
    }

    #[test]
    fn test_empty_period_has_all_categories() {
        let s = income_statement(&period(), &[], &[]).unwrap();
        assert_eq!(s.expenses.len(), ExpenseCategory::ALL.len());
        assert!(s.expenses.values().all(|v| *v == 0));
        assert_eq!(s.net_income, 0);

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["expenses"]["utilities"], serde_json::json!(0));
    }

    #[test]
    fn test_overflowing_sales_total_is_an_error() {
        let sales = vec![
            sale(PaymentMethod::Cash, i64::MAX, 0, 1),
            sale(PaymentMethod::Cash, 1, 0, 1),
        ];
        let err = income_statement(&period(), &sales, &[]).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow { ref figure } if figure == "cashSales"));

        let split = vec![
            sale(PaymentMethod::Cash, i64::MAX, 0, 1),
            sale(PaymentMethod::Mpesa, i64::MAX, 0, 1),
        ];
        assert!(income_statement(&period(), &split, &[]).is_err());
    }
}
