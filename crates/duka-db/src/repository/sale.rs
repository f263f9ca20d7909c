//! # Sale Service
//!
//! Records sales and applies their side effects.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create(sale)                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. recompute subtotals and totals from items, validate                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. CREDIT? customer must exist, be active, eligible and in good       │
//! │     standing                                    ──► Rejected           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. put(sale)                       ◄── the only write that can fail   │
//! │       │                                                                 │
//! │       ├──► 4. stock -= quantity × cf per line  (per-product lock)      │
//! │       ├──► 5. CREDIT: customer.balance -= totalAmount                  │
//! │       │        (4 and 5 are best-effort: logged, never fail the sale)  │
//! │       ▼                                                                 │
//! │  6. publish SaleRecorded (receipt printing subscribes)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{info, warn};

use duka_core::{Customer, DateRange, Document, Entity, PaymentMethod, Product, Sale};

use super::Collection;
use crate::error::{DbError, DbResult};
use crate::events::{EventBus, LedgerEvent};
use crate::locks::KeyedLocks;
use crate::store::DocumentStore;

#[derive(Debug, Clone)]
pub struct SaleRepository {
    sales: Collection<Sale>,
    products: Collection<Product>,
    customers: Collection<Customer>,
    events: EventBus,
}

impl SaleRepository {
    pub fn new(store: DocumentStore, locks: KeyedLocks, events: EventBus, tenant_id: &str) -> Self {
        SaleRepository {
            sales: Collection::new(store.clone(), locks.clone(), tenant_id),
            products: Collection::new(store.clone(), locks.clone(), tenant_id),
            customers: Collection::new(store, locks, tenant_id),
            events,
        }
    }

    /// Records a sale. Caller-supplied totals are ignored.
    pub async fn create(&self, mut sale: Sale) -> DbResult<Document<Sale>> {
        sale.recompute_totals();
        sale.validate()?;

        let credit_customer = match (sale.payment_method, sale.customer_id.as_deref()) {
            (PaymentMethod::Credit, Some(customer_id)) => {
                Some(self.check_credit(customer_id).await?)
            }
            _ => None,
        };

        let doc = self.sales.create(sale).await?;
        let sale = &doc.body;

        for item in &sale.items {
            let units = item.base_units();
            if let Err(e) = self.products.adjust_stock(&item.product_id, -units).await {
                warn!(
                    sale_id = %doc.id,
                    product_id = %item.product_id,
                    units,
                    error = %e,
                    "Stock decrement failed; sale kept"
                );
            }
        }

        if let Some(customer) = &credit_customer {
            if let Err(e) = self
                .customers
                .adjust_balance(&customer.id, -sale.total_amount)
                .await
            {
                warn!(
                    sale_id = %doc.id,
                    customer_id = %customer.id,
                    error = %e,
                    "Customer balance update failed; sale kept"
                );
            }
        }

        info!(
            sale_id = %doc.id,
            total = sale.total_amount,
            items = sale.total_items,
            method = ?sale.payment_method,
            "Sale recorded"
        );

        self.events.publish(LedgerEvent::SaleRecorded {
            tenant_id: doc.tenant_id.clone(),
            sale: doc.clone(),
        });

        Ok(doc)
    }

    async fn check_credit(&self, customer_id: &str) -> DbResult<Document<Customer>> {
        let customer = self.customers.get(customer_id).await?;
        if !customer.is_active() {
            return Err(DbError::Rejected(format!(
                "Customer {} is archived",
                customer.body.name
            )));
        }
        if !customer.body.can_buy_on_credit() {
            return Err(DbError::Rejected(format!(
                "Customer {} is not eligible for credit",
                customer.body.name
            )));
        }
        Ok(customer)
    }

    pub async fn get(&self, id: &str) -> DbResult<Document<Sale>> {
        self.sales.get(id).await
    }

    /// Active sales created within the range, oldest first.
    pub async fn list(&self, range: &DateRange) -> DbResult<Vec<Document<Sale>>> {
        self.sales.in_range(range).await
    }

    /// Hides the sale from lists and reports. Stock and balances are not
    /// reversed.
    pub async fn archive(&self, id: &str) -> DbResult<Document<Sale>> {
        let doc = self.sales.archive(id).await?;
        info!(sale_id = %id, "Sale archived");
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::events::LedgerEvent;
    use crate::repository::test_support::*;
    use duka_core::{CustomerStatus, DateRange, PaymentMethod, SaleItem};

    #[tokio::test]
    async fn test_cash_sale_recomputes_totals_and_decrements_stock() {
        let db = db().await;
        let products = db.products(TENANT);
        let bread = products.create(product("Bread", 10)).await.unwrap();
        let milk = products.create(product("Milk", 10)).await.unwrap();

        let mut input = sale(PaymentMethod::Cash, vec![item(&bread, 2), item(&milk, 3)]);
        input.total_amount = 1; // ignored
        let recorded = db.sales(TENANT).create(input).await.unwrap();

        assert_eq!(recorded.body.total_amount, 500);
        assert_eq!(recorded.body.total_items, 5);
        assert_eq!(recorded.body.items[0].subtotal, 200);

        assert_eq!(products.get(&bread.id).await.unwrap().body.stock, 8);
        assert_eq!(products.get(&milk.id).await.unwrap().body.stock, 7);
    }

    #[tokio::test]
    async fn test_variant_sale_decrements_base_units() {
        let db = db().await;
        let products = db.products(TENANT);
        let soda = products.create(product("Soda", 48)).await.unwrap();

        let mut crate_line = item(&soda, 1);
        crate_line.conversion_factor = 24.0;
        crate_line.unit_price = 1_300;
        db.sales(TENANT)
            .create(sale(PaymentMethod::Mpesa, vec![crate_line]))
            .await
            .unwrap();

        assert_eq!(products.get(&soda.id).await.unwrap().body.stock, 24);
    }

    #[tokio::test]
    async fn test_credit_sale_lowers_customer_balance() {
        let db = db().await;
        let bread = db.products(TENANT).create(product("Bread", 10)).await.unwrap();
        let customer = db.customers(TENANT).create(customer("Amina", true)).await.unwrap();

        let mut input = sale(PaymentMethod::Credit, vec![item(&bread, 3)]);
        input.customer_id = Some(customer.id.clone());
        db.sales(TENANT).create(input).await.unwrap();

        let loaded = db.customers(TENANT).get(&customer.id).await.unwrap();
        assert_eq!(loaded.body.balance, -300);
    }

    #[tokio::test]
    async fn test_credit_sale_requires_eligible_customer() {
        let db = db().await;
        let bread = db.products(TENANT).create(product("Bread", 10)).await.unwrap();
        let customers = db.customers(TENANT);

        let no_customer = sale(PaymentMethod::Credit, vec![item(&bread, 1)]);
        let err = db.sales(TENANT).create(no_customer).await.unwrap_err();
        match err {
            DbError::Validation(errors) => assert_eq!(errors.fields(), vec!["customerId"]),
            other => panic!("unexpected error: {other}"),
        }

        let ineligible = customers.create(customer("Juma", false)).await.unwrap();
        let mut input = sale(PaymentMethod::Credit, vec![item(&bread, 1)]);
        input.customer_id = Some(ineligible.id.clone());
        let err = db.sales(TENANT).create(input).await.unwrap_err();
        assert!(matches!(err, DbError::Rejected(_)));

        let mut blocked_body = customer("Wekesa", true);
        blocked_body.status = CustomerStatus::Blocked;
        let blocked = customers.create(blocked_body).await.unwrap();
        let mut input = sale(PaymentMethod::Credit, vec![item(&bread, 1)]);
        input.customer_id = Some(blocked.id.clone());
        assert!(db.sales(TENANT).create(input).await.is_err());

        let mut input = sale(PaymentMethod::Credit, vec![item(&bread, 1)]);
        input.customer_id = Some("s1:missing".into());
        assert!(db.sales(TENANT).create(input).await.unwrap_err().is_not_found());

        // Nothing was sold
        assert_eq!(db.products(TENANT).get(&bread.id).await.unwrap().body.stock, 10);
    }

    #[tokio::test]
    async fn test_sale_survives_missing_product() {
        let db = db().await;
        let ghost = SaleItem {
            product_id: "s1:ghost".into(),
            name: "Ghost".into(),
            buy_price: 10,
            unit_price: 20,
            quantity: 1,
            subtotal: 0,
            discount: 0,
            conversion_factor: 1.0,
        };

        let recorded = db
            .sales(TENANT)
            .create(sale(PaymentMethod::Cash, vec![ghost]))
            .await
            .unwrap();
        assert_eq!(db.sales(TENANT).get(&recorded.id).await.unwrap().body.total_amount, 20);
    }

    #[tokio::test]
    async fn test_sale_kept_when_stock_decrement_overflows() {
        let db = db().await;
        let mut rx = db.subscribe();
        let products = db.products(TENANT);
        let oversold = products.create(product("Sukari", i64::MIN + 1)).await.unwrap();

        let recorded = db
            .sales(TENANT)
            .create(sale(PaymentMethod::Cash, vec![item(&oversold, 3)]))
            .await
            .unwrap();

        assert_eq!(products.get(&oversold.id).await.unwrap().body.stock, i64::MIN + 1);
        assert_eq!(db.sales(TENANT).get(&recorded.id).await.unwrap().body.total_amount, 300);
        match rx.recv().await.unwrap() {
            LedgerEvent::SaleRecorded { sale, .. } => assert_eq!(sale.id, recorded.id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sale_publishes_event_and_archive_hides_it() {
        let db = db().await;
        let mut rx = db.subscribe();
        let bread = db.products(TENANT).create(product("Bread", 10)).await.unwrap();

        let recorded = db
            .sales(TENANT)
            .create(sale(PaymentMethod::Cash, vec![item(&bread, 1)]))
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            LedgerEvent::SaleRecorded { sale, .. } => assert_eq!(sale.id, recorded.id),
            other => panic!("unexpected event: {other:?}"),
        }

        let today = DateRange::day(recorded.created_at.date_naive());
        assert_eq!(db.sales(TENANT).list(&today).await.unwrap().len(), 1);

        db.sales(TENANT).archive(&recorded.id).await.unwrap();
        assert!(db.sales(TENANT).list(&today).await.unwrap().is_empty());
    }
}
