//! # Balance Sheet
//!
//! A management report assembled from several independent sources. Nothing
//! forces `assets = liabilities + equity`; the report states whether it
//! closes (`balanced`) and by how much it misses (`difference`).
//!
//! ## Sources
//! ```text
//! ┌──────────────────────────┬────────────────────────────────────────────┐
//! │ source                   │ bucket                                     │
//! ├──────────────────────────┼────────────────────────────────────────────┤
//! │ products (snapshot)      │ inventory  = Σ stock × base-unit price     │
//! │ customers (snapshot)     │ receivable = Σ |balance| where balance < 0 │
//! │ suppliers (snapshot)     │ payable    = Σ balance where balance > 0   │
//! │ accounts (snapshot)      │ cash      += Σ balance                     │
//! │ expenses (in range)      │ prepaid    = Σ amount where date > to      │
//! │ entries (in range)       │ bucket named by the entry's category       │
//! └──────────────────────────┴────────────────────────────────────────────┘
//! ```
//!
//! Every total is the sum of the parts listed next to it:
//!
//! - `totalCurrentAssets = cash + receivable + inventory + prepaid + otherCurrent`
//! - `fixedAssets = propertyAndEquipment + otherFixed − accumulatedDepreciation`
//! - `totalAssets = totalCurrentAssets + fixedAssets`
//! - `totalEquity = ownerCapital + retainedEarnings + otherEquity − drawings`
//!
//! A figure too large for an amount fails the whole report.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::entity::{
    Account, BalanceCategory, BalanceSheetEntry, Customer, Expense, Product, Supplier,
};
use crate::error::{CoreError, CoreResult};
use crate::money;
use crate::reports::DateRange;

/// Scanned inputs of [`balance_sheet`].
#[derive(Debug, Clone, Copy)]
pub struct BalanceSheetInputs<'a> {
    pub products: &'a [Document<Product>],
    pub customers: &'a [Document<Customer>],
    pub suppliers: &'a [Document<Supplier>],
    pub accounts: &'a [Document<Account>],
    pub expenses: &'a [Document<Expense>],
    pub entries: &'a [Document<BalanceSheetEntry>],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSheet {
    pub period: Option<DateRange>,

    // Current assets
    pub cash: i64,
    pub accounts_receivable: i64,
    pub inventory: i64,
    pub prepaid_expenses: i64,
    pub other_current_assets: i64,
    pub total_current_assets: i64,

    // Fixed assets
    pub property_and_equipment: i64,
    pub accumulated_depreciation: i64,
    pub other_fixed_assets: i64,
    pub fixed_assets: i64,
    pub total_assets: i64,

    // Liabilities
    pub accounts_payable: i64,
    pub short_term_loans: i64,
    pub accrued_expenses: i64,
    pub other_current_liabilities: i64,
    pub total_current_liabilities: i64,
    pub long_term_loans: i64,
    pub other_long_term_liabilities: i64,
    pub total_long_term_liabilities: i64,
    pub total_liabilities: i64,

    // Equity
    pub owner_capital: i64,
    pub retained_earnings: i64,
    pub drawings: i64,
    pub other_equity: i64,
    pub total_equity: i64,

    /// `totalAssets − totalLiabilities − totalEquity`.
    pub difference: i64,
    pub balanced: bool,
}

impl BalanceSheet {
    fn add_entry(&mut self, category: BalanceCategory, amount: i64) -> CoreResult<()> {
        use BalanceCategory::*;
        let bucket = match category {
            Cash => &mut self.cash,
            AccountsReceivable => &mut self.accounts_receivable,
            Inventory => &mut self.inventory,
            PrepaidExpenses => &mut self.prepaid_expenses,
            OtherCurrentAsset => &mut self.other_current_assets,
            PropertyAndEquipment => &mut self.property_and_equipment,
            AccumulatedDepreciation => &mut self.accumulated_depreciation,
            OtherFixedAsset => &mut self.other_fixed_assets,
            AccountsPayable => &mut self.accounts_payable,
            ShortTermLoan => &mut self.short_term_loans,
            AccruedExpenses => &mut self.accrued_expenses,
            OtherCurrentLiability => &mut self.other_current_liabilities,
            LongTermLoan => &mut self.long_term_loans,
            OtherLongTermLiability => &mut self.other_long_term_liabilities,
            OwnerCapital => &mut self.owner_capital,
            RetainedEarnings => &mut self.retained_earnings,
            Drawings => &mut self.drawings,
            OtherEquity => &mut self.other_equity,
        };
        *bucket = bucket
            .checked_add(amount)
            .ok_or_else(|| CoreError::AmountOverflow {
                figure: format!("{:?}", category),
            })?;
        Ok(())
    }

    fn compute_totals(&mut self) -> CoreResult<()> {
        self.total_current_assets = money::total(
            "totalCurrentAssets",
            [
                self.cash,
                self.accounts_receivable,
                self.inventory,
                self.prepaid_expenses,
                self.other_current_assets,
            ],
        )?;
        self.fixed_assets = money::sub(
            "fixedAssets",
            money::add("fixedAssets", self.property_and_equipment, self.other_fixed_assets)?,
            self.accumulated_depreciation,
        )?;
        self.total_assets = money::add("totalAssets", self.total_current_assets, self.fixed_assets)?;

        self.total_current_liabilities = money::total(
            "totalCurrentLiabilities",
            [
                self.accounts_payable,
                self.short_term_loans,
                self.accrued_expenses,
                self.other_current_liabilities,
            ],
        )?;
        self.total_long_term_liabilities = money::add(
            "totalLongTermLiabilities",
            self.long_term_loans,
            self.other_long_term_liabilities,
        )?;
        self.total_liabilities = money::add(
            "totalLiabilities",
            self.total_current_liabilities,
            self.total_long_term_liabilities,
        )?;

        self.total_equity = money::sub(
            "totalEquity",
            money::total(
                "totalEquity",
                [self.owner_capital, self.retained_earnings, self.other_equity],
            )?,
            self.drawings,
        )?;

        self.difference = money::sub(
            "difference",
            money::sub("difference", self.total_assets, self.total_liabilities)?,
            self.total_equity,
        )?;
        self.balanced = self.difference == 0;
        Ok(())
    }
}

/// Fails with [`CoreError::AmountOverflow`](crate::CoreError::AmountOverflow)
/// when a line or total does not fit an amount.
pub fn balance_sheet(period: &DateRange, inputs: BalanceSheetInputs<'_>) -> CoreResult<BalanceSheet> {
    let mut sheet = BalanceSheet {
        period: Some(*period),
        ..Default::default()
    };

    sheet.inventory = inputs
        .products
        .iter()
        .try_fold(0i64, |sum, p| sum.checked_add(p.body.inventory_value()?))
        .ok_or_else(|| CoreError::AmountOverflow {
            figure: "inventory".into(),
        })?;
    sheet.accounts_receivable = money::total(
        "accountsReceivable",
        inputs.customers.iter().map(|c| c.body.amount_owed()),
    )?;
    sheet.accounts_payable = money::total(
        "accountsPayable",
        inputs.suppliers.iter().map(|s| s.body.amount_payable()),
    )?;
    sheet.cash = money::total("cash", inputs.accounts.iter().map(|a| a.body.balance))?;
    sheet.prepaid_expenses = money::total(
        "prepaidExpenses",
        inputs
            .expenses
            .iter()
            .filter(|e| e.body.date > period.to)
            .map(|e| e.body.amount),
    )?;

    for entry in inputs.entries {
        sheet.add_entry(entry.body.category, entry.body.amount)?;
    }

    sheet.compute_totals()?;
    Ok(sheet)
}
