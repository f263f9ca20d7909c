//! # Operation Dispatcher
//!
//! Maps `(session, operation name, positional args)` onto the write,
//! report and system services, and wraps every outcome in one envelope.
//!
//! ## Dispatch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Dispatcher::dispatch                            │
//! │                                                                         │
//! │  Session ──validate──┐                                                  │
//! │  "createSale" ──FromStr──▶ OperationName ──(args)──▶ Operation          │
//! │                                                          │              │
//! │                                   tokio::spawn (panic → INTERNAL)       │
//! │                                                          │              │
//! │               ┌──────────────┬──────────────┬────────────┴───────┐      │
//! │               ▼              ▼              ▼                    ▼      │
//! │          Collection<T>  SaleRepository  ReportRepository   status/probe │
//! │               │              │              │                    │      │
//! │               └──────────────┴──────┬───────┴────────────────────┘      │
//! │                                     ▼                                   │
//! │                 { success: true, data } | { success: false, error }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod args;
pub mod operation;

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use duka_core::CoreError;
use duka_db::Database;
use duka_sync::{ReplicationError, ReplicationStatus};

use crate::error::ApiError;
use crate::probe::ConnectivityProbe;
use crate::session::Session;

pub use operation::{Operation, OperationName};

/// Outcome of one dispatched operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Response {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: ApiError) -> Self {
        Response {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<Value, ApiError> {
        match (self.data, self.error) {
            (_, Some(error)) => Err(error),
            (data, None) => Ok(data.unwrap_or(Value::Null)),
        }
    }
}

impl From<Result<Value, ApiError>> for Response {
    fn from(result: Result<Value, ApiError>) -> Self {
        match result {
            Ok(data) => Response::ok(data),
            Err(error) => Response::err(error),
        }
    }
}

fn data<T: Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::from(CoreError::from(e)))
}

// =============================================================================
// Dispatcher
// =============================================================================

#[derive(Clone)]
pub struct Dispatcher {
    db: Database,
    replication: Option<watch::Receiver<ReplicationStatus>>,
    max_attempts: u32,
    probe: ConnectivityProbe,
}

impl Dispatcher {
    pub fn new(db: Database) -> Self {
        Dispatcher {
            db,
            replication: None,
            max_attempts: 10,
            probe: ConnectivityProbe::unconfigured(),
        }
    }

    /// Reports the running engine's status from `syncStatus`.
    pub fn with_replication(
        mut self,
        status: watch::Receiver<ReplicationStatus>,
        max_attempts: u32,
    ) -> Self {
        self.replication = Some(status);
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_probe(mut self, probe: ConnectivityProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Runs one operation. Never panics and never returns a bare error.
    pub async fn dispatch(&self, session: &Session, name: &str, args: Vec<Value>) -> Response {
        let started = Instant::now();
        let result = self.try_dispatch(session, name, args).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => debug!(
                operation = %name,
                tenant = %session.tenant_id,
                elapsed_ms,
                "Operation completed"
            ),
            Err(e) => warn!(
                operation = %name,
                tenant = %session.tenant_id,
                code = ?e.code,
                error = %e.message,
                "Operation failed"
            ),
        }
        Response::from(result)
    }

    async fn try_dispatch(
        &self,
        session: &Session,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, ApiError> {
        session.validate()?;
        let op_name: OperationName = name.parse()?;
        let op = Operation::parse(op_name, args)?;
        debug!(operation = %op_name, write = op.is_write(), "Dispatching operation");

        let this = self.clone();
        let session = session.clone();
        match tokio::spawn(async move { this.execute(&session, op).await }).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                error!(operation = %op_name, "Operation panicked");
                Err(ApiError::internal(format!("{} failed unexpectedly", op_name)))
            }
            Err(e) => Err(ApiError::internal(e.to_string())),
        }
    }

    /// Runs an already decoded operation for `session`.
    pub async fn execute(&self, session: &Session, op: Operation) -> Result<Value, ApiError> {
        let tenant = session.tenant_id.as_str();
        let db = &self.db;

        match op {
            // Customers
            Operation::CreateCustomer(input) => data(db.customers(tenant).create(input).await?),
            Operation::UpdateCustomer { id, input } => {
                data(db.customers(tenant).update(&id, input).await?)
            }
            Operation::ArchiveCustomer(id) => data(db.customers(tenant).archive(&id).await?),
            Operation::GetCustomer(id) => data(db.customers(tenant).get(&id).await?),
            Operation::ListCustomers(limit) => data(db.customers(tenant).list(limit).await?),
            Operation::SearchCustomers { query, limit } => {
                data(db.customers(tenant).search(&query, limit).await?)
            }

            // Products
            Operation::CreateProduct(input) => data(db.products(tenant).create(input).await?),
            Operation::UpdateProduct { id, input } => {
                data(db.products(tenant).update(&id, input).await?)
            }
            Operation::ArchiveProduct(id) => data(db.products(tenant).archive(&id).await?),
            Operation::GetProduct(id) => data(db.products(tenant).get(&id).await?),
            Operation::ListProducts(limit) => data(db.products(tenant).list(limit).await?),
            Operation::SearchProducts { query, limit } => {
                data(db.products(tenant).search_units(&query, limit).await?)
            }

            // Staff
            Operation::CreateStaff(input) => data(db.staff(tenant).create(input).await?),
            Operation::UpdateStaff { id, input } => data(db.staff(tenant).update(&id, input).await?),
            Operation::ArchiveStaff(id) => data(db.staff(tenant).archive(&id).await?),
            Operation::GetStaff(id) => data(db.staff(tenant).get(&id).await?),
            Operation::ListStaff(limit) => data(db.staff(tenant).list(limit).await?),

            // Suppliers
            Operation::CreateSupplier(input) => data(db.suppliers(tenant).create(input).await?),
            Operation::UpdateSupplier { id, input } => {
                data(db.suppliers(tenant).update(&id, input).await?)
            }
            Operation::ArchiveSupplier(id) => data(db.suppliers(tenant).archive(&id).await?),
            Operation::GetSupplier(id) => data(db.suppliers(tenant).get(&id).await?),
            Operation::ListSuppliers(limit) => data(db.suppliers(tenant).list(limit).await?),
            Operation::SearchSuppliers { query, limit } => {
                data(db.suppliers(tenant).search(&query, limit).await?)
            }

            // Sales
            Operation::CreateSale(mut sale) => {
                if sale.staff_id.is_none() {
                    sale.staff_id = session.staff_id.clone();
                }
                data(db.sales(tenant).create(sale).await?)
            }
            Operation::GetSale(id) => data(db.sales(tenant).get(&id).await?),
            Operation::ListSales(range) => data(db.sales(tenant).list(&range).await?),
            Operation::ArchiveSale(id) => data(db.sales(tenant).archive(&id).await?),

            // Finance
            Operation::CreateExpense(input) => data(db.finance(tenant).create_expense(input).await?),
            Operation::UpdateExpense { id, input } => {
                data(db.finance(tenant).update_expense(&id, input).await?)
            }
            Operation::ArchiveExpense(id) => data(db.finance(tenant).archive_expense(&id).await?),
            Operation::ListExpenses(range) => data(db.finance(tenant).list_expenses(&range).await?),
            Operation::CreateTransaction(input) => {
                data(db.finance(tenant).create_transaction(input).await?)
            }
            Operation::ListTransactions(range) => {
                data(db.finance(tenant).list_transactions(&range).await?)
            }
            Operation::CreateAccount(input) => data(db.finance(tenant).create_account(input).await?),
            Operation::UpdateAccount { id, input } => {
                data(db.finance(tenant).update_account(&id, input).await?)
            }
            Operation::ListAccounts => data(db.finance(tenant).list_accounts().await?),
            Operation::CreateBalanceSheetEntry(input) => {
                data(db.finance(tenant).create_entry(input).await?)
            }
            Operation::UpdateBalanceSheetEntry { id, input } => {
                data(db.finance(tenant).update_entry(&id, input).await?)
            }
            Operation::ArchiveBalanceSheetEntry(id) => {
                data(db.finance(tenant).archive_entry(&id).await?)
            }
            Operation::ListBalanceSheetEntries => data(db.finance(tenant).list_entries().await?),
            Operation::RecordRestock(invoice) => {
                data(db.finance(tenant).record_restock(invoice).await?)
            }

            // Reports
            Operation::IncomeStatement(range) => {
                data(db.reports(tenant).income_statement(&range).await?)
            }
            Operation::BalanceSheet(range) => data(db.reports(tenant).balance_sheet(&range).await?),
            Operation::AccountStatement { range, account_id } => data(
                db.reports(tenant)
                    .account_statement(&range, account_id.as_deref())
                    .await?,
            ),
            Operation::DashboardSummary => {
                let today = duka_core::time::now().date_naive();
                data(db.reports(tenant).dashboard_summary(today).await?)
            }
            Operation::SalesSummary(range) => data(db.reports(tenant).sales_summary(&range).await?),
            Operation::HourlySales(date) => data(db.reports(tenant).hourly_sales(date).await?),
            Operation::DailySales(range) => data(db.reports(tenant).daily_sales(&range).await?),
            Operation::TopCustomers { range, limit } => {
                data(db.reports(tenant).top_customers(&range, limit).await?)
            }
            Operation::TopProducts { range, limit } => {
                data(db.reports(tenant).top_products(&range, limit).await?)
            }
            Operation::SalesByCategory(range) => {
                data(db.reports(tenant).sales_by_category(&range).await?)
            }
            Operation::GrossProfitMargin(range) => {
                data(db.reports(tenant).gross_profit_margin(&range).await?)
            }
            Operation::PeriodComparison(range) => {
                data(db.reports(tenant).period_comparison(&range).await?)
            }

            // System
            Operation::SyncStatus => data(self.sync_status(tenant).await?),
            Operation::CheckConnectivity => data(self.probe.check().await),
        }
    }

    /// Engine status with outbox counts read fresh for `tenant`.
    pub async fn sync_status(&self, tenant: &str) -> Result<ReplicationStatus, ApiError> {
        let mut status = match &self.replication {
            Some(rx) => rx.borrow().clone(),
            None => ReplicationStatus::disabled(),
        };

        let outbox = self.db.outbox();
        let (pending, stalled) = tokio::try_join!(
            outbox.count_pending(tenant),
            outbox.count_stalled(tenant, self.max_attempts),
        )
        .map_err(ReplicationError::from)?;
        status.pending = pending;
        status.stalled = stalled;
        Ok(status)
    }
}
