//! # Document Store
//!
//! Generic put/get/find over JSON documents, backed by one SQLite table.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  documents                                                              │
//! │  ┌──────────┬─────────────┬───────────┬───────┬────────────┬─────┬────┐ │
//! │  │ id (PK)  │ record_type │ tenant_id │ state │ created_at │ rev │seq │ │
//! │  └──────────┴─────────────┴───────────┴───────┴────────────┴─────┴────┘ │
//! │  + body: the full document JSON (envelope and fields)                   │
//! │                                                                         │
//! │  Envelope columns exist so scans filter without parsing JSON; `body`   │
//! │  is the source of truth handed back to callers.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Paths
//! ```text
//!   put(doc)            local write    validate → upsert (rev+1, new seq)
//!                                      → sync_outbox row, one transaction
//!
//!   apply_remote(doc)   replicated     validate → upsert only if newer by
//!                                      (updatedAt, rev) → no outbox row
//! ```
//!
//! Every write takes a fresh `seq` from a node-local counter; the
//! replication feed ([`DocumentStore::changes_since`]) walks that counter.
//!
//! There is no multi-document transaction. Callers that touch several
//! documents (sale → stock → customer balance) do so as independent puts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, warn};

use duka_core::document::from_value;
use duka_core::entity::validate_value;
use duka_core::query::{is_plain_path, sort_values, Condition, FieldCondition, SortOrder};
use duka_core::time::{format_timestamp, now};
use duka_core::{Document, Entity, RawDocument, Selector, ValidationError, ValidationErrors};

use crate::error::{DbError, DbResult};

// =============================================================================
// SQL
// =============================================================================

/// Local upsert. A conflicting row keeps its `created_at` and `tenant_id`,
/// gets `rev + 1`, and refuses to change `record_type`.
const PUT_SQL: &str = r#"
INSERT INTO documents (id, record_type, tenant_id, state, created_at, updated_at, rev, seq, body)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1,
        (SELECT COALESCE(MAX(seq), 0) + 1 FROM documents),
        json_set(?7, '$.rev', 1))
ON CONFLICT(id) DO UPDATE SET
    state      = excluded.state,
    updated_at = excluded.updated_at,
    rev        = documents.rev + 1,
    seq        = excluded.seq,
    body       = json_set(excluded.body,
                          '$.rev', documents.rev + 1,
                          '$.createdAt', documents.created_at)
WHERE documents.record_type = excluded.record_type
RETURNING rev
"#;

/// Replicated upsert, last-write-wins by `(updated_at, rev)`. Ties keep the
/// stored copy.
const APPLY_SQL: &str = r#"
INSERT INTO documents (id, record_type, tenant_id, state, created_at, updated_at, rev, seq, body)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7,
        (SELECT COALESCE(MAX(seq), 0) + 1 FROM documents),
        ?8)
ON CONFLICT(id) DO UPDATE SET
    state      = excluded.state,
    updated_at = excluded.updated_at,
    rev        = excluded.rev,
    seq        = excluded.seq,
    body       = excluded.body
WHERE documents.record_type = excluded.record_type
  AND (excluded.updated_at > documents.updated_at
       OR (excluded.updated_at = documents.updated_at AND excluded.rev > documents.rev))
"#;

// =============================================================================
// Types
// =============================================================================

/// Acknowledgement of a local write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub id: String,
    pub rev: i64,
}

/// What `apply_remote` did with a replicated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Inserted, or replaced an older local copy.
    Applied,
    /// Local copy is as new or newer.
    Skipped,
}

/// One page of the change feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeBatch {
    pub docs: Vec<RawDocument>,
    /// Sequence of the last document in `docs`, or the requested cursor
    /// when the page is empty.
    pub last_seq: i64,
}

// =============================================================================
// Document Store
// =============================================================================

#[derive(Debug, Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        DocumentStore { pool }
    }

    /// Validates and stores a document, queueing it for replication.
    ///
    /// ## Returns
    /// The stored revision. The caller's copy is not modified.
    pub async fn put<T: Entity>(&self, doc: &Document<T>) -> DbResult<Ack> {
        doc.body.validate()?;
        check_id(&doc.id, &doc.tenant_id)?;

        let body = serde_json::to_string(doc)?;
        let created_at = format_timestamp(&doc.created_at);
        let updated_at = format_timestamp(&doc.updated_at);

        let mut tx = self.pool.begin().await?;

        let rev: Option<i64> = sqlx::query_scalar(PUT_SQL)
            .bind(&doc.id)
            .bind(doc.record_type.as_str())
            .bind(&doc.tenant_id)
            .bind(doc.state.as_str())
            .bind(&created_at)
            .bind(&updated_at)
            .bind(&body)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(rev) = rev else {
            return Err(DbError::Rejected(format!(
                "{} is already stored with a different record type",
                doc.id
            )));
        };

        sqlx::query(
            "INSERT INTO sync_outbox (doc_id, tenant_id, rev, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&doc.id)
        .bind(&doc.tenant_id)
        .bind(rev)
        .bind(format_timestamp(&now()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(id = %doc.id, record_type = %doc.record_type, rev, "Document stored");
        Ok(Ack {
            id: doc.id.clone(),
            rev,
        })
    }

    /// Loads a document regardless of its state.
    pub async fn get(&self, id: &str) -> DbResult<RawDocument> {
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM documents WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let body = body.ok_or_else(|| DbError::not_found("Document", id))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Loads a document as `T`. A document of another record type is
    /// reported as not found.
    pub async fn get_typed<T: Entity>(&self, id: &str) -> DbResult<Document<T>> {
        let label = T::RECORD_TYPE.label();
        let raw = self.get(id).await.map_err(|e| {
            if e.is_not_found() {
                DbError::not_found(label, id)
            } else {
                e
            }
        })?;

        if raw.record_type != T::RECORD_TYPE {
            return Err(DbError::not_found(label, id));
        }
        Ok(raw.into_typed()?)
    }

    /// Documents matching the selector, as JSON.
    ///
    /// Scalar equality and range conditions on plain paths run in SQL;
    /// every returned document is re-checked against the full selector.
    pub async fn find_values(&self, selector: &Selector) -> DbResult<Vec<Value>> {
        let matcher = selector.compile()?;

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT body FROM documents WHERE record_type = ");
        qb.push_bind(selector.record_type.as_str())
            .push(" AND tenant_id = ")
            .push_bind(selector.tenant_id.clone());

        if let Some(state) = selector.state {
            qb.push(" AND state = ").push_bind(state.as_str());
        }

        // LIMIT can only be pushed down when SQL sees the whole selector
        let mut exact = selector.any_of.is_empty();
        for fc in &selector.conditions {
            if is_plain_path(&fc.field) && fc.condition.is_scalar_comparison() {
                push_condition(&mut qb, fc);
            } else {
                exact = false;
            }
        }

        match &selector.sort {
            Some(sort) if is_plain_path(&sort.field) => {
                qb.push(" ORDER BY ").push(field_expr(&sort.field));
                qb.push(match sort.order {
                    SortOrder::Asc => " ASC",
                    SortOrder::Desc => " DESC",
                });
            }
            Some(_) => exact = false,
            None => {}
        }

        if exact {
            if let Some(limit) = selector.limit {
                qb.push(" LIMIT ").push_bind(limit as i64);
            }
        }

        let rows: Vec<String> = qb.build_query_scalar().fetch_all(&self.pool).await?;

        let mut docs = Vec::with_capacity(rows.len());
        for body in rows {
            let value: Value = serde_json::from_str(&body)?;
            if matcher.matches(&value) {
                docs.push(value);
            }
        }

        if let Some(sort) = &selector.sort {
            sort_values(&mut docs, sort);
        }
        if let Some(limit) = selector.limit {
            docs.truncate(limit);
        }

        debug!(
            record_type = %selector.record_type,
            count = docs.len(),
            "Find completed"
        );
        Ok(docs)
    }

    pub async fn find<T: Entity>(&self, selector: &Selector) -> DbResult<Vec<Document<T>>> {
        if selector.record_type != T::RECORD_TYPE {
            return Err(DbError::InvalidQuery(format!(
                "selector for {} used to read {}",
                selector.record_type,
                T::RECORD_TYPE
            )));
        }

        self.find_values(selector)
            .await?
            .into_iter()
            .map(|value| from_value::<T>(value).map_err(DbError::from))
            .collect()
    }

    pub async fn count(&self, selector: &Selector) -> DbResult<usize> {
        let mut selector = selector.clone();
        selector.limit = None;
        selector.sort = None;
        Ok(self.find_values(&selector).await?.len())
    }

    /// Creates an expression index over JSON fields. Idempotent.
    ///
    /// ## Example
    /// ```rust,ignore
    /// store.ensure_index(&["customerId"]).await?;
    /// // CREATE INDEX IF NOT EXISTS idx_doc_customerId
    /// //   ON documents(record_type, tenant_id, json_extract(body, '$.customerId'))
    /// ```
    pub async fn ensure_index(&self, fields: &[&str]) -> DbResult<String> {
        if fields.is_empty() {
            return Err(DbError::InvalidQuery("index needs at least one field".into()));
        }
        if let Some(bad) = fields.iter().find(|f| !is_plain_path(f)) {
            return Err(DbError::InvalidQuery(format!("cannot index field '{}'", bad)));
        }

        let name = format!("idx_doc_{}", fields.join("_").replace('.', "_"));
        let columns: Vec<String> = fields.iter().map(|f| field_expr(f)).collect();
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {} ON documents(record_type, tenant_id, {})",
            name,
            columns.join(", ")
        );

        sqlx::query(&sql).execute(&self.pool).await?;
        debug!(index = %name, "Index ensured");
        Ok(name)
    }

    /// Merges a document received from a replica.
    ///
    /// The document is validated like a local write but does not enter the
    /// outbox, so it is never echoed back.
    pub async fn apply_remote(&self, doc: &RawDocument) -> DbResult<ApplyOutcome> {
        let value = doc.to_value()?;
        validate_value(doc.record_type, &value)?;
        check_id(&doc.id, &doc.tenant_id)?;

        let result = sqlx::query(APPLY_SQL)
            .bind(&doc.id)
            .bind(doc.record_type.as_str())
            .bind(&doc.tenant_id)
            .bind(doc.state.as_str())
            .bind(format_timestamp(&doc.created_at))
            .bind(format_timestamp(&doc.updated_at))
            .bind(doc.rev)
            .bind(value.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            debug!(id = %doc.id, rev = doc.rev, "Remote document applied");
            Ok(ApplyOutcome::Applied)
        } else {
            debug!(id = %doc.id, rev = doc.rev, "Remote document skipped (local is newer)");
            Ok(ApplyOutcome::Skipped)
        }
    }

    /// Documents of one tenant written after `since`, oldest first.
    pub async fn changes_since(&self, tenant_id: &str, since: i64, limit: u32) -> DbResult<ChangeBatch> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT seq, body FROM documents
            WHERE tenant_id = ?1 AND seq > ?2
            ORDER BY seq ASC
            LIMIT ?3
            "#,
        )
        .bind(tenant_id)
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut batch = ChangeBatch {
            docs: Vec::with_capacity(rows.len()),
            last_seq: since,
        };
        for (seq, body) in rows {
            match serde_json::from_str::<RawDocument>(&body) {
                Ok(doc) => batch.docs.push(doc),
                Err(e) => warn!(seq, error = %e, "Skipping unreadable document in change feed"),
            }
            batch.last_seq = seq;
        }
        Ok(batch)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn check_id(id: &str, tenant_id: &str) -> DbResult<()> {
    let valid = id
        .strip_prefix(tenant_id)
        .and_then(|rest| rest.strip_prefix(':'))
        .is_some_and(|rest| !rest.is_empty());

    if !valid || tenant_id.is_empty() {
        return Err(DbError::Validation(ValidationErrors::single(
            ValidationError::InvalidFormat {
                field: "id".into(),
                reason: format!("must look like {}:<uuid>", tenant_id),
            },
        )));
    }
    Ok(())
}

/// SQL expression for a document field. Envelope fields use their column.
/// `field` must satisfy [`is_plain_path`].
fn field_expr(field: &str) -> String {
    let column = match field {
        "id" => "id",
        "recordType" => "record_type",
        "tenantId" => "tenant_id",
        "state" => "state",
        "createdAt" => "created_at",
        "updatedAt" => "updated_at",
        "rev" => "rev",
        _ => return format!("json_extract(body, '$.{}')", field),
    };
    column.to_string()
}

fn push_condition(qb: &mut QueryBuilder<'_, Sqlite>, fc: &FieldCondition) {
    qb.push(" AND ").push(field_expr(&fc.field));
    match &fc.condition {
        Condition::Eq(v) => push_scalar(qb.push(" = "), v),
        Condition::Gt(v) => push_scalar(qb.push(" > "), v),
        Condition::Gte(v) => push_scalar(qb.push(" >= "), v),
        Condition::Lt(v) => push_scalar(qb.push(" < "), v),
        Condition::Lte(v) => push_scalar(qb.push(" <= "), v),
        Condition::In(values) => {
            qb.push(" IN (");
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_scalar(qb, v);
            }
            qb.push(")");
        }
        // Never pushed down; see is_scalar_comparison
        Condition::Contains(_) | Condition::Regex(_) => {
            qb.push(" IS NOT NULL");
        }
    }
}

fn push_scalar(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        Value::Bool(b) => {
            qb.push_bind(*b);
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                qb.push_bind(i);
            }
            None => {
                qb.push_bind(n.as_f64().unwrap_or_default());
            }
        },
        _ => {
            qb.push("NULL");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use duka_core::{Customer, CustomerStatus, RecordType, Staff, StaffRole};
    use serde_json::json;

    async fn store() -> DocumentStore {
        Database::new(DbConfig::in_memory()).await.unwrap().store()
    }

    fn customer(name: &str, phone: &str, balance: i64) -> Document<Customer> {
        Document::new(
            "s1",
            Customer {
                name: name.into(),
                phone: phone.into(),
                email: None,
                address: Some("Kariakor".into()),
                balance,
                credit_eligible: false,
                status: CustomerStatus::Good,
            },
        )
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let store = store().await;
        let doc = customer("Wanjiru", "0712000001", -200);

        let ack = store.put(&doc).await.unwrap();
        assert_eq!(ack.rev, 1);

        let loaded: Document<Customer> = store.get_typed(&doc.id).await.unwrap();
        assert_eq!(loaded.body, doc.body);
        assert_eq!(loaded.created_at, doc.created_at);
        assert_eq!(loaded.rev, 1);
    }

    #[tokio::test]
    async fn test_put_bumps_rev_and_keeps_created_at() {
        let store = store().await;
        let mut doc = customer("Wanjiru", "0712000001", 0);
        store.put(&doc).await.unwrap();

        let original_created = doc.created_at;
        doc.created_at = original_created + chrono::Duration::days(3);
        doc.body.balance = 50;
        let ack = store.put(&doc).await.unwrap();
        assert_eq!(ack.rev, 2);

        let loaded: Document<Customer> = store.get_typed(&doc.id).await.unwrap();
        assert_eq!(loaded.created_at, original_created);
        assert_eq!(loaded.body.balance, 50);
    }

    #[tokio::test]
    async fn test_put_rejects_invalid_documents() {
        let store = store().await;
        let doc = customer("", "12", 0);
        let err = store.put(&doc).await.unwrap_err();
        match err {
            DbError::Validation(errors) => assert_eq!(errors.fields(), vec!["name", "phone"]),
            other => panic!("unexpected error: {other}"),
        }

        let mut foreign = customer("Juma", "0712000002", 0);
        foreign.id = "s2:abc".into();
        assert!(matches!(store.put(&foreign).await, Err(DbError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_missing_and_wrong_type() {
        let store = store().await;
        assert!(store.get("s1:nope").await.unwrap_err().is_not_found());

        let doc = customer("Juma", "0712000002", 0);
        store.put(&doc).await.unwrap();
        let wrong = store.get_typed::<Staff>(&doc.id).await.unwrap_err();
        assert_eq!(wrong.to_string(), format!("Staff member not found: {}", doc.id));
    }

    #[tokio::test]
    async fn test_find_with_pushdown_and_rust_conditions() {
        let store = store().await;
        for (name, phone, balance) in [
            ("Achieng", "0711000001", -500),
            ("Baraka", "0722000002", 0),
            ("Chebet", "0733000003", -50),
        ] {
            store.put(&customer(name, phone, balance)).await.unwrap();
        }

        let owing = Selector::new(RecordType::Customer, "s1")
            .active()
            .filter("balance", Condition::Lt(json!(0)))
            .sort_by("name", SortOrder::Asc);
        let found: Vec<Document<Customer>> = store.find(&owing).await.unwrap();
        let names: Vec<_> = found.iter().map(|c| c.body.name.as_str()).collect();
        assert_eq!(names, vec!["Achieng", "Chebet"]);

        let search = Selector::new(RecordType::Customer, "s1")
            .search(&["name", "phone"], "0722")
            .limit(5);
        let found: Vec<Document<Customer>> = store.find(&search).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].body.name, "Baraka");

        let limited = Selector::new(RecordType::Customer, "s1")
            .sort_by("balance", SortOrder::Asc)
            .limit(1);
        let found: Vec<Document<Customer>> = store.find(&limited).await.unwrap();
        assert_eq!(found[0].body.balance, -500);
        assert_eq!(store.count(&limited).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_find_is_tenant_scoped() {
        let store = store().await;
        store.put(&customer("Achieng", "0711000001", 0)).await.unwrap();
        let other = Document::new(
            "s2",
            Staff {
                name: "Otieno".into(),
                phone: "0711000009".into(),
                role: StaffRole::Cashier,
            },
        );
        store.put(&other).await.unwrap();

        let s2 = Selector::new(RecordType::Customer, "s2");
        assert!(store.find_values(&s2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_index_is_idempotent() {
        let store = store().await;
        let name = store.ensure_index(&["customerId"]).await.unwrap();
        assert_eq!(name, "idx_doc_customerId");
        store.ensure_index(&["customerId"]).await.unwrap();
        assert!(store.ensure_index(&["bad field"]).await.is_err());
    }

    #[tokio::test]
    async fn test_apply_remote_last_write_wins() {
        let store = store().await;
        let doc = customer("Wanjiru", "0712000001", 0);
        store.put(&doc).await.unwrap();

        // Older copy loses
        let mut stale = store.get(&doc.id).await.unwrap();
        stale.updated_at = doc.updated_at - chrono::Duration::seconds(5);
        stale.body.insert("balance".into(), json!(999));
        assert_eq!(store.apply_remote(&stale).await.unwrap(), ApplyOutcome::Skipped);

        // Same copy is a no-op
        let same = store.get(&doc.id).await.unwrap();
        assert_eq!(store.apply_remote(&same).await.unwrap(), ApplyOutcome::Skipped);

        // Newer copy wins and keeps its own rev
        let mut newer = same.clone();
        newer.updated_at = doc.updated_at + chrono::Duration::seconds(5);
        newer.rev = 7;
        newer.body.insert("balance".into(), json!(-40));
        assert_eq!(store.apply_remote(&newer).await.unwrap(), ApplyOutcome::Applied);

        let loaded: Document<Customer> = store.get_typed(&doc.id).await.unwrap();
        assert_eq!(loaded.body.balance, -40);
        assert_eq!(loaded.rev, 7);
    }

    #[tokio::test]
    async fn test_apply_remote_validates() {
        let store = store().await;
        let mut raw = customer("Wanjiru", "0712000001", 0).to_raw().unwrap();
        raw.body.insert("name".into(), json!(""));
        assert!(matches!(
            store.apply_remote(&raw).await,
            Err(DbError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_changes_since_pages_in_order() {
        let store = store().await;
        let a = customer("A", "0711000001", 0);
        let b = customer("B", "0711000002", 0);
        store.put(&a).await.unwrap();
        store.put(&b).await.unwrap();
        store.put(&a).await.unwrap(); // a moves to the end of the feed

        let first = store.changes_since("s1", 0, 1).await.unwrap();
        assert_eq!(first.docs.len(), 1);
        assert_eq!(first.docs[0].id, b.id);

        let rest = store.changes_since("s1", first.last_seq, 10).await.unwrap();
        assert_eq!(rest.docs.len(), 1);
        assert_eq!(rest.docs[0].id, a.id);
        assert_eq!(rest.docs[0].rev, 2);

        let empty = store.changes_since("s1", rest.last_seq, 10).await.unwrap();
        assert!(empty.docs.is_empty());
        assert_eq!(empty.last_seq, rest.last_seq);
    }
}
