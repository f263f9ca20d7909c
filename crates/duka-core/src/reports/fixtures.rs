//! Document builders shared by the reducer tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::document::Document;
use crate::entity::*;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn item(product_id: &str, unit_price: i64, buy_price: i64, quantity: i64) -> SaleItem {
    SaleItem {
        product_id: product_id.into(),
        name: product_id.trim_start_matches("s1:").to_string(),
        buy_price,
        unit_price,
        quantity,
        subtotal: 0,
        discount: 0,
        conversion_factor: 1.0,
    }
}

pub fn sale_with(method: PaymentMethod, items: Vec<SaleItem>) -> Document<Sale> {
    let mut sale = Sale {
        items,
        total_amount: 0,
        total_items: 0,
        payment_method: method,
        sale_type: SaleType::Retail,
        fulfillment_type: FulfillmentType::Pickup,
        customer_id: None,
        staff_id: None,
        mpesa_reference: None,
    };
    sale.recompute_totals();
    Document::new("s1", sale)
}

pub fn sale(method: PaymentMethod, unit_price: i64, buy_price: i64, qty: i64) -> Document<Sale> {
    sale_with(method, vec![item("s1:unga", unit_price, buy_price, qty)])
}

pub fn expense(category: ExpenseCategory, amount: i64, date: NaiveDate) -> Document<Expense> {
    Document::new(
        "s1",
        Expense {
            description: "expense".into(),
            category,
            amount,
            date,
            paid_from: None,
        },
    )
}

pub fn customer(name: &str, balance: i64) -> Document<Customer> {
    Document::new(
        "s1",
        Customer {
            name: name.into(),
            phone: "0712000000".into(),
            email: None,
            address: None,
            balance,
            credit_eligible: true,
            status: CustomerStatus::Good,
        },
    )
}

pub fn supplier(name: &str, balance: i64) -> Document<Supplier> {
    Document::new(
        "s1",
        Supplier {
            name: name.into(),
            phone: "0733000000".into(),
            email: None,
            address: None,
            balance,
        },
    )
}

pub fn product(name: &str, category: Option<&str>, unit_price: i64, stock: i64) -> Document<Product> {
    Document::new(
        "s1",
        Product {
            name: name.into(),
            sku: None,
            barcode: None,
            category: category.map(str::to_string),
            base_unit: "piece".into(),
            buy_price: unit_price / 2,
            unit_price,
            stock,
            reorder_level: Some(5),
            variants: vec![],
        },
    )
}

pub fn transfer(source: Party, destination: Party, amount: i64) -> Document<Transaction> {
    Document::new(
        "s1",
        Transaction {
            source,
            destination,
            amount,
            description: format!("{:?} to {:?}", source, destination),
            party_id: None,
            account_id: None,
            reference: None,
        },
    )
}

pub fn entry(category: BalanceCategory, amount: i64) -> Document<BalanceSheetEntry> {
    Document::new(
        "s1",
        BalanceSheetEntry {
            entry_type: category.entry_type(),
            category,
            amount,
            description: None,
        },
    )
}

pub fn account(name: &str, balance: i64) -> Document<Account> {
    Document::new(
        "s1",
        Account {
            name: name.into(),
            kind: AccountKind::Cash,
            balance,
        },
    )
}
