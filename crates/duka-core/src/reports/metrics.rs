//! # Dashboard Metrics
//!
//! Sales summaries, histograms, rankings and period comparisons.
//!
//! All ratios are computed with [`percentage`] and [`percent_change`],
//! which never divide by zero: an empty period reports `0`, not NaN.
//! Totals here clamp at the `i64` bounds; the income statement and balance
//! sheet are the figures that fail on overflow.

use std::collections::HashMap;

use chrono::{NaiveDate, Timelike};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::entity::{Customer, Expense, PaymentMethod, Product, Sale, SaleItem};
use crate::money::clamped_total;
use crate::reports::{round2, DateRange};
use crate::{BUSINESS_HOURS_END, BUSINESS_HOURS_START};

// =============================================================================
// Ratio Helpers
// =============================================================================

/// `part / whole × 100`, rounded to two places; `0` when `whole` is zero.
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

/// Change from `previous` to `current` in percent.
///
/// A zero baseline reports `0` when nothing changed and `100` otherwise.
pub fn percent_change(previous: i64, current: i64) -> f64 {
    if previous == 0 {
        return if current == 0 { 0.0 } else { 100.0 };
    }
    round2((current as f64 - previous as f64) / (previous as f64).abs() * 100.0)
}

// =============================================================================
// Sales Summary
// =============================================================================

fn sale_cogs(sale: &Sale) -> i64 {
    sale.cogs().unwrap_or(i64::MAX)
}

fn item_cost(item: &SaleItem) -> i64 {
    item.cost().unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub total_sales: i64,
    pub sale_count: usize,
    pub items_sold: i64,
    pub cash_sales: i64,
    pub mpesa_sales: i64,
    pub credit_sales: i64,
    pub cogs: i64,
    pub gross_profit: i64,
    pub average_sale: f64,
    pub gross_margin: f64,
}

pub fn sales_summary(sales: &[Document<Sale>]) -> SalesSummary {
    let mut summary = SalesSummary::default();
    for sale in sales {
        let body = &sale.body;
        summary.total_sales = summary.total_sales.saturating_add(body.total_amount);
        summary.items_sold = summary.items_sold.saturating_add(body.total_items);
        summary.cogs = summary.cogs.saturating_add(sale_cogs(body));
        let bucket = match body.payment_method {
            PaymentMethod::Cash => &mut summary.cash_sales,
            PaymentMethod::Mpesa => &mut summary.mpesa_sales,
            PaymentMethod::Credit => &mut summary.credit_sales,
        };
        *bucket = bucket.saturating_add(body.total_amount);
    }
    summary.sale_count = sales.len();
    summary.gross_profit = summary.total_sales.saturating_sub(summary.cogs);
    summary.average_sale = if sales.is_empty() {
        0.0
    } else {
        round2(summary.total_sales as f64 / sales.len() as f64)
    };
    summary.gross_margin = percentage(summary.gross_profit, summary.total_sales);
    summary
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockItem {
    pub product_id: String,
    pub name: String,
    pub stock: i64,
    pub reorder_level: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub date: NaiveDate,
    pub sales: SalesSummary,
    pub expenses: i64,
    /// Gross profit less today's expenses.
    pub net_profit: i64,
    pub product_count: usize,
    pub customer_count: usize,
    pub receivables: i64,
    pub low_stock: Vec<LowStockItem>,
}

/// Today's figures plus the current stock and receivable position.
pub fn dashboard_summary(
    date: NaiveDate,
    sales: &[Document<Sale>],
    expenses: &[Document<Expense>],
    products: &[Document<Product>],
    customers: &[Document<Customer>],
) -> DashboardSummary {
    let sales = sales_summary(sales);
    let expenses = clamped_total(expenses.iter().map(|e| e.body.amount));

    let mut low_stock: Vec<LowStockItem> = products
        .iter()
        .filter(|p| p.body.is_low_stock())
        .map(|p| LowStockItem {
            product_id: p.id.clone(),
            name: p.body.name.clone(),
            stock: p.body.stock,
            reorder_level: p.body.reorder_level.unwrap_or_default(),
        })
        .collect();
    low_stock.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));

    DashboardSummary {
        date,
        net_profit: sales.gross_profit.saturating_sub(expenses),
        sales,
        expenses,
        product_count: products.len(),
        customer_count: customers.len(),
        receivables: clamped_total(customers.iter().map(|c| c.body.amount_owed())),
        low_stock,
    }
}

// =============================================================================
// Histograms
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyBucket {
    pub hour: u32,
    pub total: i64,
    pub count: usize,
}

/// Sales per UTC hour over business hours. Sales outside those hours are
/// not counted.
pub fn hourly_sales(sales: &[Document<Sale>]) -> Vec<HourlyBucket> {
    let mut buckets: Vec<HourlyBucket> = (BUSINESS_HOURS_START..=BUSINESS_HOURS_END)
        .map(|hour| HourlyBucket {
            hour,
            total: 0,
            count: 0,
        })
        .collect();

    for sale in sales {
        let hour = sale.created_at.hour();
        if (BUSINESS_HOURS_START..=BUSINESS_HOURS_END).contains(&hour) {
            let bucket = &mut buckets[(hour - BUSINESS_HOURS_START) as usize];
            bucket.total = bucket.total.saturating_add(sale.body.total_amount);
            bucket.count += 1;
        }
    }
    buckets
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub total: i64,
    pub count: usize,
}

/// One bucket per day of the range, including days without sales.
pub fn daily_sales(range: &DateRange, sales: &[Document<Sale>]) -> Vec<DailyBucket> {
    let mut totals: HashMap<NaiveDate, (i64, usize)> = HashMap::new();
    for sale in sales {
        let entry = totals.entry(sale.created_at.date_naive()).or_default();
        entry.0 = entry.0.saturating_add(sale.body.total_amount);
        entry.1 += 1;
    }

    range
        .dates()
        .map(|date| {
            let (total, count) = totals.get(&date).copied().unwrap_or_default();
            DailyBucket { date, total, count }
        })
        .collect()
}

// =============================================================================
// Rankings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRanking {
    pub customer_id: String,
    pub name: String,
    pub total: i64,
    pub sale_count: usize,
}

/// Customers ranked by total sale amount. Walk-in sales are ignored.
pub fn top_customers(
    sales: &[Document<Sale>],
    customers: &[Document<Customer>],
    limit: usize,
) -> Vec<CustomerRanking> {
    let names: HashMap<&str, &str> = customers
        .iter()
        .map(|c| (c.id.as_str(), c.body.name.as_str()))
        .collect();

    let mut totals: HashMap<&str, (i64, usize)> = HashMap::new();
    for sale in sales {
        if let Some(id) = sale.body.customer_id.as_deref() {
            let entry = totals.entry(id).or_default();
            entry.0 = entry.0.saturating_add(sale.body.total_amount);
            entry.1 += 1;
        }
    }

    let mut ranking: Vec<CustomerRanking> = totals
        .into_iter()
        .map(|(id, (total, sale_count))| CustomerRanking {
            customer_id: id.to_string(),
            name: names.get(id).copied().unwrap_or("Unknown customer").to_string(),
            total,
            sale_count,
        })
        .collect();
    ranking.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
    ranking.truncate(limit);
    ranking
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRanking {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub revenue: i64,
    pub profit: i64,
}

/// Products ranked by revenue across sale items.
pub fn top_products(sales: &[Document<Sale>], limit: usize) -> Vec<ProductRanking> {
    let mut by_product: HashMap<&str, ProductRanking> = HashMap::new();
    for item in sales.iter().flat_map(|s| s.body.items.iter()) {
        let entry = by_product
            .entry(item.product_id.as_str())
            .or_insert_with(|| ProductRanking {
                product_id: item.product_id.clone(),
                name: item.name.clone(),
                quantity: 0,
                revenue: 0,
                profit: 0,
            });
        entry.quantity = entry.quantity.saturating_add(item.quantity);
        entry.revenue = entry.revenue.saturating_add(item.subtotal);
        entry.profit = entry
            .profit
            .saturating_add(item.subtotal.saturating_sub(item_cost(item)));
    }

    let mut ranking: Vec<ProductRanking> = by_product.into_values().collect();
    ranking.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    ranking.truncate(limit);
    ranking
}

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySales {
    pub category: String,
    pub revenue: i64,
    pub quantity: i64,
    pub share: f64,
}

/// Revenue per product category. Items whose product is unknown or has no
/// category land in [`UNCATEGORIZED`].
pub fn sales_by_category(
    sales: &[Document<Sale>],
    products: &[Document<Product>],
) -> Vec<CategorySales> {
    let categories: HashMap<&str, &str> = products
        .iter()
        .filter_map(|p| p.body.category.as_deref().map(|c| (p.id.as_str(), c)))
        .collect();

    let mut totals: HashMap<&str, (i64, i64)> = HashMap::new();
    for item in sales.iter().flat_map(|s| s.body.items.iter()) {
        let category = categories
            .get(item.product_id.as_str())
            .copied()
            .unwrap_or(UNCATEGORIZED);
        let entry = totals.entry(category).or_default();
        entry.0 = entry.0.saturating_add(item.subtotal);
        entry.1 = entry.1.saturating_add(item.quantity);
    }

    let grand_total = clamped_total(totals.values().map(|(revenue, _)| *revenue));
    let mut rows: Vec<CategorySales> = totals
        .into_iter()
        .map(|(category, (revenue, quantity))| CategorySales {
            category: category.to_string(),
            revenue,
            quantity,
            share: percentage(revenue, grand_total),
        })
        .collect();
    rows.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.category.cmp(&b.category)));
    rows
}

// =============================================================================
// Margins & Comparisons
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrossProfitMargin {
    pub revenue: i64,
    pub cogs: i64,
    pub gross_profit: i64,
    pub margin: f64,
}

pub fn gross_profit_margin(sales: &[Document<Sale>]) -> GrossProfitMargin {
    let revenue = clamped_total(sales.iter().map(|s| s.body.total_amount));
    let cogs = clamped_total(sales.iter().map(|s| sale_cogs(&s.body)));
    let gross_profit = revenue.saturating_sub(cogs);
    GrossProfitMargin {
        revenue,
        cogs,
        gross_profit,
        margin: percentage(gross_profit, revenue),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTotals {
    pub period: DateRange,
    pub sales: i64,
    pub sale_count: usize,
    pub gross_profit: i64,
    pub expenses: i64,
    pub net_profit: i64,
}

impl PeriodTotals {
    fn new(period: DateRange, sales: &[Document<Sale>], expenses: &[Document<Expense>]) -> Self {
        let summary = sales_summary(sales);
        let expenses = clamped_total(expenses.iter().map(|e| e.body.amount));
        PeriodTotals {
            period,
            sales: summary.total_sales,
            sale_count: summary.sale_count,
            gross_profit: summary.gross_profit,
            expenses,
            net_profit: summary.gross_profit.saturating_sub(expenses),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodComparison {
    pub current: PeriodTotals,
    pub previous: PeriodTotals,
    pub sales_change: f64,
    pub sale_count_change: f64,
    pub gross_profit_change: f64,
    pub expenses_change: f64,
    pub net_profit_change: f64,
}

/// Compares `current` with the equally long window right before it
/// ([`DateRange::preceding`]). The caller scans both windows.
pub fn period_comparison(
    current: &DateRange,
    current_sales: &[Document<Sale>],
    current_expenses: &[Document<Expense>],
    previous_sales: &[Document<Sale>],
    previous_expenses: &[Document<Expense>],
) -> PeriodComparison {
    let cur = PeriodTotals::new(*current, current_sales, current_expenses);
    let prev = PeriodTotals::new(current.preceding(), previous_sales, previous_expenses);

    PeriodComparison {
        sales_change: percent_change(prev.sales, cur.sales),
        sale_count_change: percent_change(prev.sale_count as i64, cur.sale_count as i64),
        gross_profit_change: percent_change(prev.gross_profit, cur.gross_profit),
        expenses_change: percent_change(prev.expenses, cur.expenses),
        net_profit_change: percent_change(prev.net_profit, cur.net_profit),
        current: cur,
        previous: prev,
    }
}
