//! # Reports
//!
//! Pure reducers from scanned documents to statements. The store side
//! (`duka-db::repository::reports`) decides what to scan; everything here
//! only folds.
//!
//! ```text
//! ┌──────────────┐   find(sale, active, createdAt ∈ range)   ┌─────────────┐
//! │ DocumentStore│ ─────────────────────────────────────────▶│  reducer    │
//! │              │   find(expense, active, createdAt ∈ range)│  (this mod) │
//! └──────────────┘ ─────────────────────────────────────────▶│             │
//!                                                            └──────┬──────┘
//!                                                                   ▼
//!                                                         IncomeStatement, ...
//! ```
//!
//! Every ratio goes through [`metrics::percentage`], so an empty input
//! yields zeros rather than NaN.

pub mod balance_sheet;
pub mod income;
pub mod metrics;
pub mod statement;

#[cfg(test)]
mod fixtures;

pub use balance_sheet::{balance_sheet, BalanceSheet, BalanceSheetInputs};
pub use income::{income_statement, IncomeStatement};
pub use metrics::{
    daily_sales, dashboard_summary, gross_profit_margin, hourly_sales, period_comparison,
    sales_by_category, sales_summary, top_customers, top_products, CategorySales,
    CustomerRanking, DailyBucket, DashboardSummary, GrossProfitMargin, HourlyBucket,
    PeriodComparison, PeriodTotals, ProductRanking, SalesSummary,
};
pub use statement::{account_statement, AccountStatement, StatementRow};

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Date Range
// =============================================================================

/// An inclusive range of calendar days, interpreted in UTC.
///
/// `[from 00:00:00.000, to 23:59:59.999]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> CoreResult<Self> {
        if from > to {
            return Err(CoreError::InvalidDateRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(DateRange { from, to })
    }

    /// A single day.
    pub fn day(date: NaiveDate) -> Self {
        DateRange {
            from: date,
            to: date,
        }
    }

    /// Parses two dates given as `YYYY-MM-DD` or as full RFC 3339
    /// timestamps (only the UTC date is kept).
    pub fn parse(from: &str, to: &str) -> CoreResult<Self> {
        Self::new(parse_date(from)?, parse_date(to)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.from.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.to.and_time(end_of_day()).and_utc()
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start() && *ts <= self.end()
    }

    /// Number of days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    /// Every day in the range, in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d <= to)
    }

    /// The equally long window ending the day before `from`.
    pub fn preceding(&self) -> Self {
        let len = self.days() as u64;
        let to = self.from.checked_sub_days(Days::new(1)).unwrap_or(self.from);
        let from = self
            .from
            .checked_sub_days(Days::new(len))
            .unwrap_or(NaiveDate::MIN);
        DateRange { from, to }
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}

fn parse_date(value: &str) -> CoreResult<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    crate::time::parse_timestamp(value).map(|ts| ts.date_naive())
}

/// Rounds to two decimal places for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
