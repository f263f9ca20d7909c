//! Products, their sellable variants, and the flattened "sellable unit"
//! view used by product search.
//!
//! Stock is always counted in base units. A variant (e.g. "Crate of 24")
//! only carries a conversion factor and its own price.

use serde::{Deserialize, Serialize};

use crate::document::{Document, RecordType};
use crate::entity::Entity;
use crate::error::ValidationErrors;
use crate::validation::{
    validate_conversion_factor, validate_non_negative, validate_required, Validator,
};

fn default_base_unit() -> String {
    "piece".to_string()
}

/// A sellable packaging of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub name: String,
    /// Base units contained in one unit of this variant. Always `> 0`.
    pub conversion_factor: f64,
    pub unit_price: i64,
}

impl Variant {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(validate_required("name", &self.name))
            .check(validate_conversion_factor(
                "conversionFactor",
                self.conversion_factor,
            ))
            .check(validate_non_negative("unitPrice", self.unit_price));
        v.finish()
    }
}

/// A product held in stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default = "default_base_unit")]
    pub base_unit: String,
    /// Cost of one base unit.
    pub buy_price: i64,
    /// Selling price of one base unit.
    pub unit_price: i64,
    /// Quantity on hand, in base units. May go negative when sales race
    /// ahead of restocks.
    #[serde(default)]
    pub stock: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reorder_level: Option<i64>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl Product {
    /// Price of one base unit: the variant whose conversion factor is 1,
    /// falling back to the product's own `unitPrice`.
    pub fn base_unit_price(&self) -> i64 {
        self.variants
            .iter()
            .find(|v| (v.conversion_factor - 1.0).abs() < f64::EPSILON)
            .map(|v| v.unit_price)
            .unwrap_or(self.unit_price)
    }

    /// Stock valued at the base-unit selling price; `None` when it does not
    /// fit an amount.
    pub fn inventory_value(&self) -> Option<i64> {
        self.stock.checked_mul(self.base_unit_price())
    }

    pub fn is_low_stock(&self) -> bool {
        self.reorder_level
            .map(|level| self.stock <= level)
            .unwrap_or(false)
    }
}

impl Entity for Product {
    const RECORD_TYPE: RecordType = RecordType::Product;

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(validate_required("name", &self.name))
            .check(validate_required("baseUnit", &self.base_unit))
            .check(validate_non_negative("buyPrice", self.buy_price))
            .check(validate_non_negative("unitPrice", self.unit_price));

        if let Some(level) = self.reorder_level {
            v.check(validate_non_negative("reorderLevel", level));
        }

        for (i, variant) in self.variants.iter().enumerate() {
            v.nested(&format!("variants[{}]", i), variant.validate());
        }

        v.finish()
    }
}

// =============================================================================
// Sellable Units
// =============================================================================

/// One row of product search: a product or one of its variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellableUnit {
    pub product_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub conversion_factor: f64,
    pub unit_price: i64,
    /// Cost of one sellable unit (`buyPrice × conversionFactor`).
    pub buy_price: i64,
    /// `stock / conversionFactor`.
    pub units_remaining: f64,
}

impl SellableUnit {
    /// Flattens a product into one row per variant, or a single row for
    /// the base product when it has no variants.
    pub fn from_product(doc: &Document<Product>) -> Vec<SellableUnit> {
        let product = &doc.body;
        let stock = product.stock as f64;

        if product.variants.is_empty() {
            return vec![SellableUnit {
                product_id: doc.id.clone(),
                name: product.name.clone(),
                variant_name: None,
                category: product.category.clone(),
                conversion_factor: 1.0,
                unit_price: product.unit_price,
                buy_price: product.buy_price,
                units_remaining: stock,
            }];
        }

        product
            .variants
            .iter()
            .map(|variant| SellableUnit {
                product_id: doc.id.clone(),
                name: format!("{} ({})", product.name, variant.name),
                variant_name: Some(variant.name.clone()),
                category: product.category.clone(),
                conversion_factor: variant.conversion_factor,
                unit_price: variant.unit_price,
                buy_price: (product.buy_price as f64 * variant.conversion_factor).round() as i64,
                units_remaining: stock / variant.conversion_factor,
            })
            .collect()
    }
}
