//! People the shop deals with: customers, suppliers and staff.

use serde::{Deserialize, Serialize};

use crate::document::RecordType;
use crate::entity::Entity;
use crate::error::ValidationErrors;
use crate::validation::{validate_email, validate_phone, validate_required, Validator};

// =============================================================================
// Customer
// =============================================================================

/// Whether a customer may keep buying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    Good,
    Blocked,
}

/// A customer account.
///
/// `balance` is signed: negative means the customer owes the shop. Credit
/// sales push it down, customer payments push it back up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub credit_eligible: bool,
    #[serde(default)]
    pub status: CustomerStatus,
}

impl Customer {
    /// Amount the customer owes (zero when in credit or settled).
    pub fn amount_owed(&self) -> i64 {
        self.balance.min(0).saturating_neg()
    }

    /// Credit sales need an eligible customer in good standing.
    pub fn can_buy_on_credit(&self) -> bool {
        self.credit_eligible && self.status == CustomerStatus::Good
    }
}

impl Entity for Customer {
    const RECORD_TYPE: RecordType = RecordType::Customer;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(validate_required("name", &self.name))
            .check(validate_phone("phone", &self.phone))
            .check(validate_email("email", &self.email));
        v.finish()
    }
}

// =============================================================================
// Supplier
// =============================================================================

/// A supplier account.
///
/// `balance` is signed: positive means the shop owes the supplier. Restocks
/// on account raise it, payments to the supplier lower it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub balance: i64,
}

impl Supplier {
    /// Amount the shop owes this supplier.
    pub fn amount_payable(&self) -> i64 {
        self.balance.max(0)
    }
}

impl Entity for Supplier {
    const RECORD_TYPE: RecordType = RecordType::Supplier;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(validate_required("name", &self.name))
            .check(validate_phone("phone", &self.phone))
            .check(validate_email("email", &self.email));
        v.finish()
    }
}

// =============================================================================
// Staff
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Owner,
    Manager,
    Cashier,
}

/// A staff member. Authentication lives in the host shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub name: String,
    pub phone: String,
    pub role: StaffRole,
}

impl Entity for Staff {
    const RECORD_TYPE: RecordType = RecordType::Staff;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(validate_required("name", &self.name))
            .check(validate_phone("phone", &self.phone));
        v.finish()
    }
}
