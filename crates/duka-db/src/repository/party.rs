//! Customer, supplier and staff services.

use tracing::info;

use duka_core::{Customer, Document, Staff, Supplier};

use super::{add_to, Collection, Searchable};
use crate::error::DbResult;

pub type CustomerRepository = Collection<Customer>;
pub type SupplierRepository = Collection<Supplier>;
pub type StaffRepository = Collection<Staff>;

impl Searchable for Customer {
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "phone", "address"];
}

impl Searchable for Supplier {
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "phone", "address"];
}

impl Searchable for Staff {
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "phone"];
}

impl Collection<Customer> {
    /// Adds `delta` to the customer's balance. Negative for credit sales,
    /// positive for payments received.
    pub async fn adjust_balance(&self, id: &str, delta: i64) -> DbResult<Document<Customer>> {
        let doc = self
            .modify(id, |customer| {
                customer.balance = add_to("balance", customer.balance, delta)?;
                Ok(())
            })
            .await?;
        info!(customer_id = %id, delta, balance = doc.body.balance, "Customer balance adjusted");
        Ok(doc)
    }
}

impl Collection<Supplier> {
    /// Adds `delta` to what the shop owes the supplier.
    pub async fn adjust_balance(&self, id: &str, delta: i64) -> DbResult<Document<Supplier>> {
        let doc = self
            .modify(id, |supplier| {
                supplier.balance = add_to("balance", supplier.balance, delta)?;
                Ok(())
            })
            .await?;
        info!(supplier_id = %id, delta, balance = doc.body.balance, "Supplier balance adjusted");
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::test_support::*;
    use duka_core::{Staff, StaffRole};

    #[tokio::test]
    async fn test_concurrent_balance_adjustments_do_not_lose_updates() {
        let db = db().await;
        let customers = db.customers(TENANT);
        let created = customers.create(customer("Amina", true)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let customers = customers.clone();
            let id = created.id.clone();
            handles.push(tokio::spawn(async move {
                customers.adjust_balance(&id, -25).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let loaded = customers.get(&created.id).await.unwrap();
        assert_eq!(loaded.body.balance, -200);
        assert_eq!(loaded.body.amount_owed(), 200);
        assert_eq!(loaded.rev, 9);
    }

    #[tokio::test]
    async fn test_supplier_balance() {
        let db = db().await;
        let suppliers = db.suppliers(TENANT);
        let created = suppliers.create(supplier("Bidco")).await.unwrap();

        suppliers.adjust_balance(&created.id, 5_000).await.unwrap();
        let paid = suppliers.adjust_balance(&created.id, -2_000).await.unwrap();
        assert_eq!(paid.body.amount_payable(), 3_000);
    }

    #[tokio::test]
    async fn test_adjust_missing_customer() {
        let db = db().await;
        let err = db
            .customers(TENANT)
            .adjust_balance("s1:missing", 10)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Customer not found: s1:missing");
    }

    #[tokio::test]
    async fn test_staff_roster() {
        let db = db().await;
        let staff = db.staff(TENANT);
        staff
            .create(Staff {
                name: "Kamau".into(),
                phone: "0733000111".into(),
                role: StaffRole::Cashier,
            })
            .await
            .unwrap();

        let found = staff.search("kam", None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].body.role, StaffRole::Cashier);
    }
}
