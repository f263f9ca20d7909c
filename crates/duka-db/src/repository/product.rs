//! # Product Service
//!
//! Catalogue CRUD plus the two stock writers: sales take base units out,
//! restocks put them back in.
//!
//! ## Stock Units
//! ```text
//! Product "Soda 500ml"   stock = 48 (bottles, the base unit)
//!   ├── Bottle  cf = 1    → unitsRemaining 48
//!   └── Crate   cf = 24   → unitsRemaining 2
//!
//! Selling 1 crate decrements stock by quantity × cf = 24.
//! ```

use tracing::{debug, info};

use duka_core::{Document, Product, SellableUnit};

use super::{add_to, Collection, Searchable};
use crate::error::DbResult;

pub type ProductRepository = Collection<Product>;

impl Searchable for Product {
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "sku", "barcode"];
}

impl Collection<Product> {
    /// Search results flattened into sellable units, one per variant.
    ///
    /// The limit bounds products, so a page can hold more units than
    /// `limit` when products have several variants.
    pub async fn search_units(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> DbResult<Vec<SellableUnit>> {
        let products = self.search(query, limit).await?;
        let units: Vec<SellableUnit> = products.iter().flat_map(SellableUnit::from_product).collect();
        debug!(query = %query, products = products.len(), units = units.len(), "Product search");
        Ok(units)
    }

    /// Adds `delta` base units to stock (negative for sales). Stock may go
    /// below zero; an oversold count is still the truth to report. A change
    /// that would leave the `i64` range is rejected.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<Document<Product>> {
        let doc = self
            .modify(id, |product| {
                product.stock = add_to("stock", product.stock, delta)?;
                Ok(())
            })
            .await?;
        debug!(product_id = %id, delta, stock = doc.body.stock, "Stock adjusted");
        Ok(doc)
    }

    /// Receives `quantity` base units at a new buy price.
    pub async fn receive_stock(
        &self,
        id: &str,
        quantity: i64,
        buy_price: i64,
    ) -> DbResult<Document<Product>> {
        let doc = self
            .modify(id, |product| {
                product.stock = add_to("stock", product.stock, quantity)?;
                product.buy_price = buy_price;
                Ok(())
            })
            .await?;
        info!(product_id = %id, quantity, buy_price, stock = doc.body.stock, "Stock received");
        Ok(doc)
    }
}
