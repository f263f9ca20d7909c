//! The closed set of operations and their typed arguments.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use duka_core::{
    Account, BalanceSheetEntry, Customer, DateRange, Expense, Invoice, Product, Sale, Staff,
    Supplier, Transaction,
};

use super::args::Args;
use crate::error::ApiError;

// =============================================================================
// Operation Names
// =============================================================================

macro_rules! operation_names {
    ($($variant:ident => $wire:literal),+ $(,)?) => {
        /// Every operation the node answers, by wire name.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OperationName {
            $($variant),+
        }

        impl OperationName {
            pub const ALL: &'static [OperationName] = &[$(OperationName::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(OperationName::$variant => $wire),+
                }
            }
        }

        impl FromStr for OperationName {
            type Err = ApiError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(OperationName::$variant),)+
                    other => Err(ApiError::unsupported(other)),
                }
            }
        }
    };
}

operation_names! {
    // Customers
    CreateCustomer => "createCustomer",
    UpdateCustomer => "updateCustomer",
    ArchiveCustomer => "archiveCustomer",
    GetCustomer => "getCustomer",
    ListCustomers => "listCustomers",
    SearchCustomers => "searchCustomers",
    // Products
    CreateProduct => "createProduct",
    UpdateProduct => "updateProduct",
    ArchiveProduct => "archiveProduct",
    GetProduct => "getProduct",
    ListProducts => "listProducts",
    SearchProducts => "searchProducts",
    // Staff
    CreateStaff => "createStaff",
    UpdateStaff => "updateStaff",
    ArchiveStaff => "archiveStaff",
    GetStaff => "getStaff",
    ListStaff => "listStaff",
    // Suppliers
    CreateSupplier => "createSupplier",
    UpdateSupplier => "updateSupplier",
    ArchiveSupplier => "archiveSupplier",
    GetSupplier => "getSupplier",
    ListSuppliers => "listSuppliers",
    SearchSuppliers => "searchSuppliers",
    // Sales
    CreateSale => "createSale",
    GetSale => "getSale",
    ListSales => "listSales",
    ArchiveSale => "archiveSale",
    // Finance
    CreateExpense => "createExpense",
    UpdateExpense => "updateExpense",
    ArchiveExpense => "archiveExpense",
    ListExpenses => "listExpenses",
    CreateTransaction => "createTransaction",
    ListTransactions => "listTransactions",
    CreateAccount => "createAccount",
    UpdateAccount => "updateAccount",
    ListAccounts => "listAccounts",
    CreateBalanceSheetEntry => "createBalanceSheetEntry",
    UpdateBalanceSheetEntry => "updateBalanceSheetEntry",
    ArchiveBalanceSheetEntry => "archiveBalanceSheetEntry",
    ListBalanceSheetEntries => "listBalanceSheetEntries",
    RecordRestock => "recordRestock",
    // Reports
    IncomeStatement => "incomeStatement",
    BalanceSheet => "balanceSheet",
    AccountStatement => "accountStatement",
    DashboardSummary => "dashboardSummary",
    SalesSummary => "salesSummary",
    HourlySales => "hourlySales",
    DailySales => "dailySales",
    TopCustomers => "topCustomers",
    TopProducts => "topProducts",
    SalesByCategory => "salesByCategory",
    GrossProfitMargin => "grossProfitMargin",
    PeriodComparison => "periodComparison",
    // System
    SyncStatus => "syncStatus",
    CheckConnectivity => "checkConnectivity",
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Typed Operations
// =============================================================================

/// An operation with its arguments decoded.
#[derive(Debug, Clone)]
pub enum Operation {
    CreateCustomer(Customer),
    UpdateCustomer { id: String, input: Customer },
    ArchiveCustomer(String),
    GetCustomer(String),
    ListCustomers(Option<usize>),
    SearchCustomers { query: String, limit: Option<usize> },

    CreateProduct(Product),
    UpdateProduct { id: String, input: Product },
    ArchiveProduct(String),
    GetProduct(String),
    ListProducts(Option<usize>),
    SearchProducts { query: String, limit: Option<usize> },

    CreateStaff(Staff),
    UpdateStaff { id: String, input: Staff },
    ArchiveStaff(String),
    GetStaff(String),
    ListStaff(Option<usize>),

    CreateSupplier(Supplier),
    UpdateSupplier { id: String, input: Supplier },
    ArchiveSupplier(String),
    GetSupplier(String),
    ListSuppliers(Option<usize>),
    SearchSuppliers { query: String, limit: Option<usize> },

    CreateSale(Sale),
    GetSale(String),
    ListSales(DateRange),
    ArchiveSale(String),

    CreateExpense(Expense),
    UpdateExpense { id: String, input: Expense },
    ArchiveExpense(String),
    ListExpenses(DateRange),
    CreateTransaction(Transaction),
    ListTransactions(DateRange),
    CreateAccount(Account),
    UpdateAccount { id: String, input: Account },
    ListAccounts,
    CreateBalanceSheetEntry(BalanceSheetEntry),
    UpdateBalanceSheetEntry { id: String, input: BalanceSheetEntry },
    ArchiveBalanceSheetEntry(String),
    ListBalanceSheetEntries,
    RecordRestock(Invoice),

    IncomeStatement(DateRange),
    BalanceSheet(DateRange),
    AccountStatement { range: DateRange, account_id: Option<String> },
    DashboardSummary,
    SalesSummary(DateRange),
    HourlySales(chrono::NaiveDate),
    DailySales(DateRange),
    TopCustomers { range: DateRange, limit: Option<usize> },
    TopProducts { range: DateRange, limit: Option<usize> },
    SalesByCategory(DateRange),
    GrossProfitMargin(DateRange),
    PeriodComparison(DateRange),

    SyncStatus,
    CheckConnectivity,
}

impl Operation {
    /// Decodes `args` for `name`. Missing, mistyped or surplus arguments
    /// are validation errors.
    pub fn parse(name: OperationName, args: Vec<Value>) -> Result<Operation, ApiError> {
        use OperationName as N;

        let mut a = Args::new(name, args);
        let op = match name {
            N::CreateCustomer => Operation::CreateCustomer(a.required("input")?),
            N::UpdateCustomer => Operation::UpdateCustomer {
                id: a.id()?,
                input: a.required("input")?,
            },
            N::ArchiveCustomer => Operation::ArchiveCustomer(a.id()?),
            N::GetCustomer => Operation::GetCustomer(a.id()?),
            N::ListCustomers => Operation::ListCustomers(a.limit()?),
            N::SearchCustomers => Operation::SearchCustomers {
                query: a.required("query")?,
                limit: a.limit()?,
            },

            N::CreateProduct => Operation::CreateProduct(a.required("input")?),
            N::UpdateProduct => Operation::UpdateProduct {
                id: a.id()?,
                input: a.required("input")?,
            },
            N::ArchiveProduct => Operation::ArchiveProduct(a.id()?),
            N::GetProduct => Operation::GetProduct(a.id()?),
            N::ListProducts => Operation::ListProducts(a.limit()?),
            N::SearchProducts => Operation::SearchProducts {
                query: a.required("query")?,
                limit: a.limit()?,
            },

            N::CreateStaff => Operation::CreateStaff(a.required("input")?),
            N::UpdateStaff => Operation::UpdateStaff {
                id: a.id()?,
                input: a.required("input")?,
            },
            N::ArchiveStaff => Operation::ArchiveStaff(a.id()?),
            N::GetStaff => Operation::GetStaff(a.id()?),
            N::ListStaff => Operation::ListStaff(a.limit()?),

            N::CreateSupplier => Operation::CreateSupplier(a.required("input")?),
            N::UpdateSupplier => Operation::UpdateSupplier {
                id: a.id()?,
                input: a.required("input")?,
            },
            N::ArchiveSupplier => Operation::ArchiveSupplier(a.id()?),
            N::GetSupplier => Operation::GetSupplier(a.id()?),
            N::ListSuppliers => Operation::ListSuppliers(a.limit()?),
            N::SearchSuppliers => Operation::SearchSuppliers {
                query: a.required("query")?,
                limit: a.limit()?,
            },

            N::CreateSale => Operation::CreateSale(a.required("input")?),
            N::GetSale => Operation::GetSale(a.id()?),
            N::ListSales => Operation::ListSales(a.range()?),
            N::ArchiveSale => Operation::ArchiveSale(a.id()?),

            N::CreateExpense => Operation::CreateExpense(a.required("input")?),
            N::UpdateExpense => Operation::UpdateExpense {
                id: a.id()?,
                input: a.required("input")?,
            },
            N::ArchiveExpense => Operation::ArchiveExpense(a.id()?),
            N::ListExpenses => Operation::ListExpenses(a.range()?),
            N::CreateTransaction => Operation::CreateTransaction(a.required("input")?),
            N::ListTransactions => Operation::ListTransactions(a.range()?),
            N::CreateAccount => Operation::CreateAccount(a.required("input")?),
            N::UpdateAccount => Operation::UpdateAccount {
                id: a.id()?,
                input: a.required("input")?,
            },
            N::ListAccounts => Operation::ListAccounts,
            N::CreateBalanceSheetEntry => {
                Operation::CreateBalanceSheetEntry(a.required("input")?)
            }
            N::UpdateBalanceSheetEntry => Operation::UpdateBalanceSheetEntry {
                id: a.id()?,
                input: a.required("input")?,
            },
            N::ArchiveBalanceSheetEntry => Operation::ArchiveBalanceSheetEntry(a.id()?),
            N::ListBalanceSheetEntries => Operation::ListBalanceSheetEntries,
            N::RecordRestock => Operation::RecordRestock(a.required("input")?),

            N::IncomeStatement => Operation::IncomeStatement(a.range()?),
            N::BalanceSheet => Operation::BalanceSheet(a.range()?),
            N::AccountStatement => Operation::AccountStatement {
                range: a.range()?,
                account_id: a.optional("accountId")?,
            },
            N::DashboardSummary => Operation::DashboardSummary,
            N::SalesSummary => Operation::SalesSummary(a.range()?),
            N::HourlySales => Operation::HourlySales(a.date("date")?),
            N::DailySales => Operation::DailySales(a.range()?),
            N::TopCustomers => Operation::TopCustomers {
                range: a.range()?,
                limit: a.limit()?,
            },
            N::TopProducts => Operation::TopProducts {
                range: a.range()?,
                limit: a.limit()?,
            },
            N::SalesByCategory => Operation::SalesByCategory(a.range()?),
            N::GrossProfitMargin => Operation::GrossProfitMargin(a.range()?),
            N::PeriodComparison => Operation::PeriodComparison(a.range()?),

            N::SyncStatus => Operation::SyncStatus,
            N::CheckConnectivity => Operation::CheckConnectivity,
        };
        a.finish()?;
        Ok(op)
    }

    /// Whether the operation writes to the store.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Operation::CreateCustomer(_)
                | Operation::UpdateCustomer { .. }
                | Operation::ArchiveCustomer(_)
                | Operation::CreateProduct(_)
                | Operation::UpdateProduct { .. }
                | Operation::ArchiveProduct(_)
                | Operation::CreateStaff(_)
                | Operation::UpdateStaff { .. }
                | Operation::ArchiveStaff(_)
                | Operation::CreateSupplier(_)
                | Operation::UpdateSupplier { .. }
                | Operation::ArchiveSupplier(_)
                | Operation::CreateSale(_)
                | Operation::ArchiveSale(_)
                | Operation::CreateExpense(_)
                | Operation::UpdateExpense { .. }
                | Operation::ArchiveExpense(_)
                | Operation::CreateTransaction(_)
                | Operation::CreateAccount(_)
                | Operation::UpdateAccount { .. }
                | Operation::CreateBalanceSheetEntry(_)
                | Operation::UpdateBalanceSheetEntry { .. }
                | Operation::ArchiveBalanceSheetEntry(_)
                | Operation::RecordRestock(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_wire_names_round_trip() {
        for name in OperationName::ALL {
            assert_eq!(name.as_str().parse::<OperationName>().unwrap(), *name);
        }
        assert_eq!(OperationName::ALL.len(), 55);
    }

    #[test]
    fn test_unknown_name_is_unsupported() {
        let err = "dropTables".parse::<OperationName>().unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedOperation);
        // Wire names are case-sensitive
        assert!("CreateSale".parse::<OperationName>().is_err());
    }

    #[test]
    fn test_missing_argument_is_validation_error() {
        let err = Operation::parse(OperationName::GetCustomer, vec![]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(err.message.contains("id"), "{}", err.message);
    }

    #[test]
    fn test_surplus_argument_is_validation_error() {
        let err = Operation::parse(OperationName::ListAccounts, vec![json!(1)]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_wrong_type_is_validation_error() {
        let err = Operation::parse(OperationName::ListCustomers, vec![json!("ten")]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = Operation::parse(OperationName::GetSale, vec![json!(42)]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_optional_arguments() {
        let op = Operation::parse(OperationName::ListCustomers, vec![]).unwrap();
        assert!(matches!(op, Operation::ListCustomers(None)));

        let op = Operation::parse(
            OperationName::SearchProducts,
            vec![json!("sugar"), Value::Null],
        )
        .unwrap();
        assert!(matches!(op, Operation::SearchProducts { limit: None, .. }));

        let op = Operation::parse(
            OperationName::AccountStatement,
            vec![json!("2024-03-01"), json!("2024-03-31"), json!("s1:till")],
        )
        .unwrap();
        match op {
            Operation::AccountStatement { range, account_id } => {
                assert_eq!(range.days(), 31);
                assert_eq!(account_id.as_deref(), Some("s1:till"));
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn test_dates_are_checked() {
        let err = Operation::parse(
            OperationName::IncomeStatement,
            vec![json!("2024-03-31"), json!("2024-03-01")],
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = Operation::parse(OperationName::HourlySales, vec![json!("yesterday")])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_input_is_decoded_into_entity() {
        let op = Operation::parse(
            OperationName::CreateCustomer,
            vec![json!({ "name": "Amina", "phone": "0712345678" })],
        )
        .unwrap();
        assert!(op.is_write());
        match op {
            Operation::CreateCustomer(customer) => assert_eq!(customer.name, "Amina"),
            other => panic!("unexpected operation: {other:?}"),
        }

        let err = Operation::parse(OperationName::CreateCustomer, vec![json!({ "name": "Amina" })])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
