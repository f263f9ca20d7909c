//! End-to-end operations through the dispatcher against a file-backed store.

use serde_json::{json, Value};
use tempfile::TempDir;

use duka_db::{Database, DbConfig};
use duka_node::{Dispatcher, ErrorCode, Session};

struct Node {
    dispatcher: Dispatcher,
    session: Session,
    _dir: TempDir,
}

impl Node {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("duka.db")))
            .await
            .unwrap();
        Node {
            dispatcher: Dispatcher::new(db),
            session: Session::new("kariakoo")
                .with_staff("kariakoo:cashier-1")
                .with_store_name("Kariakoo Shop"),
            _dir: dir,
        }
    }

    async fn call(&self, operation: &str, args: Vec<Value>) -> Value {
        let response = self.dispatcher.dispatch(&self.session, operation, args).await;
        match response.into_result() {
            Ok(data) => data,
            Err(e) => panic!("{operation} failed: {e}"),
        }
    }

    async fn fail(&self, operation: &str, args: Vec<Value>) -> ErrorCode {
        let response = self.dispatcher.dispatch(&self.session, operation, args).await;
        assert!(!response.success, "{operation} unexpectedly succeeded");
        response.error.unwrap().code
    }

    async fn product(&self, name: &str, buy: i64, sell: i64, stock: i64) -> String {
        let doc = self
            .call(
                "createProduct",
                vec![json!({ "name": name, "buyPrice": buy, "unitPrice": sell, "stock": stock })],
            )
            .await;
        doc["id"].as_str().unwrap().to_string()
    }
}

fn today() -> String {
    chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

fn line(product_id: &str, name: &str, buy: i64, sell: i64, quantity: i64) -> Value {
    json!({
        "productId": product_id,
        "name": name,
        "buyPrice": buy,
        "unitPrice": sell,
        "quantity": quantity
    })
}

#[tokio::test]
async fn test_create_get_round_trip() {
    let node = Node::new().await;
    let input = json!({
        "name": "Amina Hassan",
        "phone": "0712 345 678",
        "address": "Mtaa wa Kongo",
        "creditEligible": true
    });

    let created = node.call("createCustomer", vec![input.clone()]).await;
    let id = created["id"].as_str().unwrap();
    assert!(id.starts_with("kariakoo:"));
    assert_eq!(created["recordType"], "customer");
    assert!(created["createdAt"].is_string());
    assert!(created["updatedAt"].is_string());

    let fetched = node.call("getCustomer", vec![json!(id)]).await;
    for field in ["name", "phone", "address", "creditEligible"] {
        assert_eq!(fetched[field], input[field], "{field}");
    }
}

#[tokio::test]
async fn test_archive_hides_from_lists_not_get() {
    let node = Node::new().await;
    let kept = node.product("Sugar 1kg", 80, 100, 10).await;
    let gone = node.product("Salt 500g", 20, 30, 10).await;

    node.call("archiveProduct", vec![json!(gone)]).await;

    let listed = node.call("listProducts", vec![]).await;
    let ids: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![kept.as_str()]);

    let search = node.call("searchProducts", vec![json!("salt")]).await;
    assert!(search.as_array().unwrap().is_empty());

    let archived = node.call("getProduct", vec![json!(gone)]).await;
    assert_eq!(archived["state"], "inactive");
}

#[tokio::test]
async fn test_sale_totals_come_from_items() {
    let node = Node::new().await;
    let bread = node.product("Bread", 40, 100, 20).await;
    let milk = node.product("Milk 500ml", 30, 50, 20).await;

    let sale = node
        .call(
            "createSale",
            vec![json!({
                "items": [line(&bread, "Bread", 40, 100, 2), line(&milk, "Milk 500ml", 30, 50, 1)],
                "totalAmount": 9999,
                "paymentMethod": "CASH"
            })],
        )
        .await;

    assert_eq!(sale["totalAmount"], 250);
    assert_eq!(sale["totalItems"], 3);
    assert_eq!(sale["items"][0]["subtotal"], 200);
    assert_eq!(sale["items"][1]["subtotal"], 50);

    let bread_after = node.call("getProduct", vec![json!(bread)]).await;
    assert_eq!(bread_after["stock"], 18);
}

#[tokio::test]
async fn test_credit_sale_rules() {
    let node = Node::new().await;
    let rice = node.product("Rice 2kg", 150, 200, 10).await;
    let walk_in = node
        .call("createCustomer", vec![json!({ "name": "Juma", "phone": "0722111222" })])
        .await;
    let regular = node
        .call(
            "createCustomer",
            vec![json!({ "name": "Wanjiru", "phone": "0733111222", "creditEligible": true })],
        )
        .await;

    let credit_sale = |customer: &Value| {
        json!({
            "items": [line(&rice, "Rice 2kg", 150, 200, 2)],
            "paymentMethod": "CREDIT",
            "customerId": customer["id"]
        })
    };

    let code = node.fail("createSale", vec![credit_sale(&walk_in)]).await;
    assert_eq!(code, ErrorCode::ValidationError);

    node.call("createSale", vec![credit_sale(&regular)]).await;
    let after = node.call("getCustomer", vec![regular["id"].clone()]).await;
    assert_eq!(after["balance"], -400);
}

#[tokio::test]
async fn test_income_statement_identity() {
    let node = Node::new().await;
    let soap = node.product("Soap", 40, 60, 50).await;

    for (method, qty) in [("CASH", 3), ("MPESA", 2)] {
        let mut sale = json!({
            "items": [line(&soap, "Soap", 40, 60, qty)],
            "paymentMethod": method
        });
        if method == "MPESA" {
            sale["mpesaReference"] = json!("QK7XY12ABC");
        }
        node.call("createSale", vec![sale]).await;
    }
    node.call(
        "createExpense",
        vec![json!({ "description": "Stall rent", "category": "rent", "amount": 100, "date": today() })],
    )
    .await;

    let report = node
        .call("incomeStatement", vec![json!(today()), json!(today())])
        .await;
    assert_eq!(report["cashSales"], 180);
    assert_eq!(report["mpesaSales"], 120);
    assert_eq!(report["totalSales"], 300);
    assert_eq!(report["cogs"], 200);
    assert_eq!(report["totalExpenses"], 100);
    assert_eq!(report["netIncome"], 0);
    assert_eq!(report["expenses"].as_object().unwrap().len(), 10);
}

#[tokio::test]
async fn test_empty_period_reports_zero() {
    let node = Node::new().await;
    let margin = node
        .call("grossProfitMargin", vec![json!("2020-01-01"), json!("2020-01-31")])
        .await;
    assert_eq!(margin["margin"], 0.0);

    let summary = node
        .call("salesSummary", vec![json!("2020-01-01"), json!("2020-01-31")])
        .await;
    assert!(summary.to_string().contains("0"));
    assert!(!summary.to_string().contains("NaN"));

    let hourly = node.call("hourlySales", vec![json!("2020-01-01")]).await;
    assert_eq!(hourly.as_array().unwrap().len(), 16);
}

#[tokio::test]
async fn test_restock_updates_stock_and_supplier() {
    let node = Node::new().await;
    let flour = node.product("Flour 2kg", 100, 140, 4).await;
    let supplier = node
        .call("createSupplier", vec![json!({ "name": "Azam Mills", "phone": "0744000111" })])
        .await;

    let outcome = node
        .call(
            "recordRestock",
            vec![json!({
                "supplierId": supplier["id"],
                "lines": [{ "productId": flour, "quantity": 10, "buyPrice": 110 }],
                "amountPaid": 400
            })],
        )
        .await;
    assert_eq!(outcome["failedProducts"], json!([]));
    assert_eq!(outcome["supplierBalanceUpdated"], true);

    let product = node.call("getProduct", vec![json!(flour)]).await;
    assert_eq!(product["stock"], 14);
    assert_eq!(product["buyPrice"], 110);

    let supplier = node.call("getSupplier", vec![supplier["id"].clone()]).await;
    assert_eq!(supplier["balance"], 700);
}

#[tokio::test]
async fn test_tenants_do_not_see_each_other() {
    let node = Node::new().await;
    let amina = node
        .call("createCustomer", vec![json!({ "name": "Amina", "phone": "0712345678" })])
        .await;

    let other = Session::new("mwenge");
    let response = node
        .dispatcher
        .dispatch(&other, "getCustomer", vec![amina["id"].clone()])
        .await;
    assert_eq!(response.error.unwrap().code, ErrorCode::NotFound);

    let listed = node
        .dispatcher
        .dispatch(&other, "listCustomers", vec![])
        .await
        .into_result()
        .unwrap();
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_and_malformed_calls_fail_cleanly() {
    let node = Node::new().await;
    assert_eq!(
        node.fail("deleteAllCustomers", vec![]).await,
        ErrorCode::UnsupportedOperation
    );
    assert_eq!(
        node.fail("updateCustomer", vec![json!("kariakoo:x")]).await,
        ErrorCode::ValidationError
    );
    assert_eq!(
        node.fail("createExpense", vec![json!({ "description": "", "category": "rent", "amount": -5, "date": today() })]).await,
        ErrorCode::ValidationError
    );
    assert_eq!(
        node.fail("getSale", vec![json!("kariakoo:missing")]).await,
        ErrorCode::NotFound
    );
}

#[tokio::test]
async fn test_out_of_range_amounts_and_ranges_are_refused() {
    let node = Node::new().await;
    let gold = node.product("Gold bar", 1, 1, 10).await;

    let saturating = json!({
        "items": [line(&gold, "Gold bar", 1, 1 << 62, 4)],
        "paymentMethod": "CASH"
    });
    assert_eq!(node.fail("createSale", vec![saturating]).await, ErrorCode::ValidationError);

    let summing = json!({
        "items": [line(&gold, "Gold bar", 1, i64::MAX, 1), line(&gold, "Gold bar", 1, i64::MAX, 1)],
        "paymentMethod": "CASH"
    });
    assert_eq!(node.fail("createSale", vec![summing]).await, ErrorCode::ValidationError);
    assert_eq!(node.call("getProduct", vec![json!(gold)]).await["stock"], 10);

    assert_eq!(
        node.fail("dailySales", vec![json!("0001-01-01"), json!("9999-12-31")]).await,
        ErrorCode::ValidationError
    );
    let month = node
        .call("dailySales", vec![json!("2020-01-01"), json!("2020-01-31")])
        .await;
    assert_eq!(month.as_array().unwrap().len(), 31);
}
