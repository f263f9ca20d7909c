//! # Sales
//!
//! A sale embeds its line items. Line subtotals and the sale totals are
//! derived values; [`Sale::recompute_totals`] fills them in and
//! [`Sale::validate`] rejects any document where they disagree.
//!
//! ```text
//! items: [{unitPrice: 100, quantity: 2}, {unitPrice: 50, quantity: 1}]
//!          subtotal = 200                 subtotal = 50
//! totalAmount = 250, totalItems = 3
//! ```

use serde::{Deserialize, Serialize};

use crate::document::RecordType;
use crate::entity::Entity;
use crate::error::{ValidationError, ValidationErrors};
use crate::money;
use crate::validation::{
    validate_conversion_factor, validate_document_id, validate_non_negative,
    validate_optional_id, validate_positive, validate_required, Validator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    Cash,
    Mpesa,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleType {
    #[default]
    Retail,
    Wholesale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentType {
    #[default]
    Pickup,
    Delivery,
}

fn one() -> f64 {
    1.0
}

fn overflow(field: &str, figure: &str) -> ValidationError {
    ValidationError::Inconsistent {
        field: field.into(),
        reason: format!("{} does not fit an amount", figure),
    }
}

/// One line of a sale, priced per sold unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub product_id: String,
    pub name: String,
    /// Cost of one sold unit at the time of sale.
    pub buy_price: i64,
    pub unit_price: i64,
    pub quantity: i64,
    #[serde(default)]
    pub subtotal: i64,
    /// Informational; never changes `subtotal`.
    #[serde(default)]
    pub discount: i64,
    /// Base units per sold unit.
    #[serde(default = "one")]
    pub conversion_factor: f64,
}

impl SaleItem {
    /// `unitPrice × quantity`, `None` when it does not fit an amount.
    pub fn expected_subtotal(&self) -> Option<i64> {
        self.unit_price.checked_mul(self.quantity)
    }

    /// `buyPrice × quantity`.
    pub fn cost(&self) -> Option<i64> {
        self.buy_price.checked_mul(self.quantity)
    }

    /// Base units this line takes out of stock.
    pub fn base_units(&self) -> i64 {
        (self.quantity as f64 * self.conversion_factor).round() as i64
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(validate_document_id("productId", &self.product_id))
            .check(validate_required("name", &self.name))
            .check(validate_non_negative("buyPrice", self.buy_price))
            .check(validate_non_negative("unitPrice", self.unit_price))
            .check(validate_positive("quantity", self.quantity))
            .check(validate_non_negative("discount", self.discount))
            .check(validate_conversion_factor(
                "conversionFactor",
                self.conversion_factor,
            ));

        match self.expected_subtotal() {
            Some(expected) if expected != self.subtotal => {
                v.push(ValidationError::Inconsistent {
                    field: "subtotal".into(),
                    reason: format!(
                        "expected unitPrice × quantity = {}, got {}",
                        expected, self.subtotal
                    ),
                });
            }
            Some(_) => {}
            None => {
                v.push(overflow("subtotal", "unitPrice × quantity"));
            }
        }
        if self.cost().is_none() {
            v.push(overflow("buyPrice", "buyPrice × quantity"));
        }
        v.finish()
    }
}

/// A completed sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub items: Vec<SaleItem>,
    #[serde(default)]
    pub total_amount: i64,
    #[serde(default)]
    pub total_items: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub sale_type: SaleType,
    #[serde(default)]
    pub fulfillment_type: FulfillmentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpesa_reference: Option<String>,
}

impl Sale {
    /// Derives every line subtotal and the sale totals from the items.
    /// Caller-supplied totals are discarded. A figure that overflows is
    /// left at zero for [`Entity::validate`] to reject.
    pub fn recompute_totals(&mut self) {
        for item in &mut self.items {
            item.subtotal = item.expected_subtotal().unwrap_or_default();
        }
        self.total_amount = money::checked_total(self.items.iter().map(|i| i.subtotal))
            .unwrap_or_default();
        self.total_items = money::checked_total(self.items.iter().map(|i| i.quantity))
            .unwrap_or_default();
    }

    /// Cost of goods sold: `Σ quantity × buyPrice`.
    pub fn cogs(&self) -> Option<i64> {
        self.items
            .iter()
            .try_fold(0i64, |sum, item| sum.checked_add(item.cost()?))
    }

    pub fn gross_profit(&self) -> Option<i64> {
        self.total_amount.checked_sub(self.cogs()?)
    }
}

impl Entity for Sale {
    const RECORD_TYPE: RecordType = RecordType::Sale;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();

        if self.items.is_empty() {
            v.push(ValidationError::Required {
                field: "items".into(),
            });
        }
        for (i, item) in self.items.iter().enumerate() {
            v.nested(&format!("items[{}]", i), item.validate());
        }

        match money::checked_total(self.items.iter().map(|i| i.subtotal)) {
            Some(expected) if expected != self.total_amount => {
                v.push(ValidationError::Inconsistent {
                    field: "totalAmount".into(),
                    reason: format!(
                        "expected sum of subtotals = {}, got {}",
                        expected, self.total_amount
                    ),
                });
            }
            Some(_) => {}
            None => {
                v.push(overflow("totalAmount", "sum of subtotals"));
            }
        }
        match money::checked_total(self.items.iter().map(|i| i.quantity)) {
            Some(expected) if expected != self.total_items => {
                v.push(ValidationError::Inconsistent {
                    field: "totalItems".into(),
                    reason: format!(
                        "expected sum of quantities = {}, got {}",
                        expected, self.total_items
                    ),
                });
            }
            Some(_) => {}
            None => {
                v.push(overflow("totalItems", "sum of quantities"));
            }
        }
        if self.cogs().is_none() {
            v.push(overflow("items", "sum of line costs"));
        }

        match (&self.payment_method, &self.customer_id) {
            (PaymentMethod::Credit, None) => {
                v.push(ValidationError::Required {
                    field: "customerId".into(),
                });
            }
            (_, id) => {
                v.check(validate_optional_id("customerId", id));
            }
        }
        v.check(validate_optional_id("staffId", &self.staff_id));

        v.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(unit_price: i64, quantity: i64) -> SaleItem {
        SaleItem {
            product_id: "store-1:p".into(),
            name: "Item".into(),
            buy_price: unit_price / 2,
            unit_price,
            quantity,
            subtotal: 0,
            discount: 0,
            conversion_factor: 1.0,
        }
    }

    fn sale(items: Vec<SaleItem>) -> Sale {
        Sale {
            items,
            total_amount: 0,
            total_items: 0,
            payment_method: PaymentMethod::Cash,
            sale_type: SaleType::Retail,
            fulfillment_type: FulfillmentType::Pickup,
            customer_id: None,
            staff_id: None,
            mpesa_reference: None,
        }
    }

    #[test]
    fn test_sale_additivity() {
        let mut sale = sale(vec![item(100, 2), item(50, 1)]);
        sale.total_amount = 999; // ignored
        sale.recompute_totals();

        assert_eq!(sale.total_amount, 250);
        assert_eq!(sale.total_items, 3);
        for item in &sale.items {
            assert_eq!(item.subtotal, item.unit_price * item.quantity);
        }
        assert!(sale.validate().is_ok());
    }

    #[test]
    fn test_inconsistent_totals_rejected() {
        let mut sale = sale(vec![item(100, 2)]);
        sale.recompute_totals();
        sale.total_amount = 150;

        let errors = sale.validate().unwrap_err();
        assert_eq!(errors.fields(), vec!["totalAmount"]);
    }

    #[test]
    fn test_credit_sale_requires_customer() {
        let mut sale = sale(vec![item(100, 1)]);
        sale.payment_method = PaymentMethod::Credit;
        sale.recompute_totals();

        let errors = sale.validate().unwrap_err();
        assert_eq!(errors.fields(), vec!["customerId"]);
    }

    #[test]
    fn test_empty_sale_rejected() {
        let sale = sale(vec![]);
        assert_eq!(sale.validate().unwrap_err().fields(), vec!["items"]);
    }

    #[test]
    fn test_cogs_and_base_units() {
        let mut crate_item = item(1300, 2);
        crate_item.buy_price = 960;
        crate_item.conversion_factor = 24.0;
        let mut sale = sale(vec![crate_item]);
        sale.recompute_totals();

        assert_eq!(sale.cogs(), Some(1920));
        assert_eq!(sale.gross_profit(), Some(2600 - 1920));
        assert_eq!(sale.items[0].base_units(), 48);
    }

    #[test]
    fn test_line_overflow_rejected_not_saturated() {
        let mut sale = sale(vec![item(1 << 62, 4)]);
        sale.recompute_totals();

        let errors = sale.validate().unwrap_err();
        assert!(errors.fields().contains(&"items[0].subtotal"));
    }

    #[test]
    fn test_total_overflow_rejected() {
        let mut line = item(i64::MAX, 1);
        line.buy_price = i64::MAX;
        let mut sale = sale(vec![line.clone(), line]);
        sale.recompute_totals();

        let errors = sale.validate().unwrap_err();
        assert!(errors.fields().contains(&"totalAmount"));
        assert_eq!(sale.cogs(), None);
    }

    #[test]
    fn test_payment_method_wire_names() {
        assert_eq!(
            serde_json::to_value(PaymentMethod::Mpesa).unwrap(),
            serde_json::json!("MPESA")
        );
    }
}
