//! # Report Scans
//!
//! Decides which documents each report needs, scans them concurrently and
//! hands them to the pure reducers in `duka_core::reports`.
//!
//! ```text
//! ┌───────────────────┬─────────────────────────────────────────────────────┐
//! │ report            │ scans                                               │
//! ├───────────────────┼─────────────────────────────────────────────────────┤
//! │ income statement  │ sales ∈ range, expenses ∈ range                     │
//! │ balance sheet     │ products, customers, suppliers, accounts (snapshot) │
//! │                   │ + expenses ∈ range, entries ∈ range                 │
//! │ account statement │ transactions ∈ range                                │
//! │ dashboard         │ sales today, expenses today, products, customers    │
//! │ comparison        │ sales + expenses in range and in preceding window   │
//! └───────────────────┴─────────────────────────────────────────────────────┘
//! ```
//!
//! Snapshot scans read every active document regardless of `createdAt`.

use chrono::NaiveDate;
use tracing::debug;

use duka_core::reports::{
    self, AccountStatement, BalanceSheet, BalanceSheetInputs, CategorySales, CustomerRanking,
    DailyBucket, DashboardSummary, GrossProfitMargin, HourlyBucket, IncomeStatement,
    PeriodComparison, ProductRanking, SalesSummary,
};
use duka_core::{
    Account, BalanceSheetEntry, Customer, DateRange, Expense, Product, Sale, Supplier,
    Transaction, DEFAULT_TOP_N, MAX_DAILY_BUCKETS,
};

use super::Collection;
use crate::error::{DbError, DbResult};
use crate::locks::KeyedLocks;
use crate::store::DocumentStore;

#[derive(Debug, Clone)]
pub struct ReportRepository {
    sales: Collection<Sale>,
    expenses: Collection<Expense>,
    transactions: Collection<Transaction>,
    products: Collection<Product>,
    customers: Collection<Customer>,
    suppliers: Collection<Supplier>,
    accounts: Collection<Account>,
    entries: Collection<BalanceSheetEntry>,
}

impl ReportRepository {
    pub fn new(store: DocumentStore, locks: KeyedLocks, tenant_id: &str) -> Self {
        ReportRepository {
            sales: Collection::new(store.clone(), locks.clone(), tenant_id),
            expenses: Collection::new(store.clone(), locks.clone(), tenant_id),
            transactions: Collection::new(store.clone(), locks.clone(), tenant_id),
            products: Collection::new(store.clone(), locks.clone(), tenant_id),
            customers: Collection::new(store.clone(), locks.clone(), tenant_id),
            suppliers: Collection::new(store.clone(), locks.clone(), tenant_id),
            accounts: Collection::new(store.clone(), locks.clone(), tenant_id),
            entries: Collection::new(store, locks, tenant_id),
        }
    }

    pub async fn income_statement(&self, range: &DateRange) -> DbResult<IncomeStatement> {
        let (sales, expenses) =
            tokio::try_join!(self.sales.in_range(range), self.expenses.in_range(range))?;
        debug!(sales = sales.len(), expenses = expenses.len(), "Income statement scan");
        Ok(reports::income_statement(range, &sales, &expenses)?)
    }

    pub async fn balance_sheet(&self, range: &DateRange) -> DbResult<BalanceSheet> {
        let (products, customers, suppliers, accounts, expenses, entries) = tokio::try_join!(
            self.products.all_active(),
            self.customers.all_active(),
            self.suppliers.all_active(),
            self.accounts.all_active(),
            self.expenses.in_range(range),
            self.entries.in_range(range),
        )?;

        Ok(reports::balance_sheet(
            range,
            BalanceSheetInputs {
                products: &products,
                customers: &customers,
                suppliers: &suppliers,
                accounts: &accounts,
                expenses: &expenses,
                entries: &entries,
            },
        )?)
    }

    pub async fn account_statement(
        &self,
        range: &DateRange,
        account_id: Option<&str>,
    ) -> DbResult<AccountStatement> {
        let transactions = self.transactions.in_range(range).await?;
        Ok(reports::account_statement(range, account_id, &transactions)?)
    }

    /// Figures for `date` plus the current stock and receivables.
    pub async fn dashboard_summary(&self, date: NaiveDate) -> DbResult<DashboardSummary> {
        let day = DateRange::day(date);
        let (sales, expenses, products, customers) = tokio::try_join!(
            self.sales.in_range(&day),
            self.expenses.in_range(&day),
            self.products.all_active(),
            self.customers.all_active(),
        )?;
        Ok(reports::dashboard_summary(
            date, &sales, &expenses, &products, &customers,
        ))
    }

    pub async fn sales_summary(&self, range: &DateRange) -> DbResult<SalesSummary> {
        let sales = self.sales.in_range(range).await?;
        Ok(reports::sales_summary(&sales))
    }

    /// Hour-of-day histogram for one day.
    pub async fn hourly_sales(&self, date: NaiveDate) -> DbResult<Vec<HourlyBucket>> {
        let sales = self.sales.in_range(&DateRange::day(date)).await?;
        Ok(reports::hourly_sales(&sales))
    }

    /// One bucket per day; ranges longer than [`MAX_DAILY_BUCKETS`] days
    /// are refused before any scan.
    pub async fn daily_sales(&self, range: &DateRange) -> DbResult<Vec<DailyBucket>> {
        if range.days() > MAX_DAILY_BUCKETS {
            return Err(DbError::InvalidQuery(format!(
                "daily sales covers at most {} days, got {}",
                MAX_DAILY_BUCKETS,
                range.days()
            )));
        }
        let sales = self.sales.in_range(range).await?;
        Ok(reports::daily_sales(range, &sales))
    }

    pub async fn top_customers(
        &self,
        range: &DateRange,
        limit: Option<usize>,
    ) -> DbResult<Vec<CustomerRanking>> {
        // Archived customers keep their name in the ranking
        let every_customer = self.customers.selector();
        let (sales, customers) = tokio::try_join!(
            self.sales.in_range(range),
            self.customers.find(&every_customer),
        )?;
        Ok(reports::top_customers(
            &sales,
            &customers,
            limit.unwrap_or(DEFAULT_TOP_N),
        ))
    }

    pub async fn top_products(
        &self,
        range: &DateRange,
        limit: Option<usize>,
    ) -> DbResult<Vec<ProductRanking>> {
        let sales = self.sales.in_range(range).await?;
        Ok(reports::top_products(&sales, limit.unwrap_or(DEFAULT_TOP_N)))
    }

    pub async fn sales_by_category(&self, range: &DateRange) -> DbResult<Vec<CategorySales>> {
        let every_product = self.products.selector();
        let (sales, products) = tokio::try_join!(
            self.sales.in_range(range),
            self.products.find(&every_product),
        )?;
        Ok(reports::sales_by_category(&sales, &products))
    }

    pub async fn gross_profit_margin(&self, range: &DateRange) -> DbResult<GrossProfitMargin> {
        let sales = self.sales.in_range(range).await?;
        Ok(reports::gross_profit_margin(&sales))
    }

    /// `range` against the equally long window right before it.
    pub async fn period_comparison(&self, range: &DateRange) -> DbResult<PeriodComparison> {
        let previous = range.preceding();
        let (cur_sales, cur_expenses, prev_sales, prev_expenses) = tokio::try_join!(
            self.sales.in_range(range),
            self.expenses.in_range(range),
            self.sales.in_range(&previous),
            self.expenses.in_range(&previous),
        )?;
        Ok(reports::period_comparison(
            range,
            &cur_sales,
            &cur_expenses,
            &prev_sales,
            &prev_expenses,
        ))
    }
}
