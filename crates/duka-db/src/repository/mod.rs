//! # Write Services
//!
//! Per-entity services layered on the [`DocumentStore`].
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Dispatcher                                                            │
//! │       │  db.sales(tenant).create(sale)                                  │
//! │       ▼                                                                 │
//! │  SaleRepository / FinanceRepository    (multi-document side effects)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Collection<T>                          (one record type, one tenant)  │
//! │  ├── create / update / modify / archive                                │
//! │  └── get / list / search / in_range / find                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DocumentStore                          (put / get / find)             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Customer, supplier, staff and product services are `Collection<T>`
//! aliases with extra inherent methods; sales, finance and reports get their
//! own structs because they coordinate several collections.

pub mod finance;
pub mod party;
pub mod product;
pub mod reports;
pub mod sale;
pub mod sync;

use std::marker::PhantomData;

use tracing::debug;

use duka_core::{DateRange, Document, Entity, Selector, SortOrder, MAX_LIST_LIMIT};

use crate::error::{DbError, DbResult};
use crate::locks::KeyedLocks;
use crate::store::DocumentStore;

/// Entities with a free-text search.
pub trait Searchable: Entity {
    /// Fields matched (case-insensitive substring) by `search`.
    const SEARCH_FIELDS: &'static [&'static str];
}

/// Typed access to one record type within one tenant.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    store: DocumentStore,
    locks: KeyedLocks,
    tenant_id: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Collection<T> {
    pub fn new(store: DocumentStore, locks: KeyedLocks, tenant_id: &str) -> Self {
        Collection {
            store,
            locks,
            tenant_id: tenant_id.to_string(),
            _marker: PhantomData,
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// A selector scoped to this record type and tenant.
    pub fn selector(&self) -> Selector {
        Selector::new(T::RECORD_TYPE, self.tenant_id.as_str())
    }

    /// Stores a new document with a generated id.
    pub async fn create(&self, body: T) -> DbResult<Document<T>> {
        let mut doc = Document::new(&self.tenant_id, body);
        let ack = self.store.put(&doc).await?;
        doc.rev = ack.rev;
        debug!(id = %doc.id, record_type = %T::RECORD_TYPE, "Document created");
        Ok(doc)
    }

    /// Loads a document of this tenant, active or not.
    pub async fn get(&self, id: &str) -> DbResult<Document<T>> {
        let doc = self.store.get_typed::<T>(id).await?;
        if doc.tenant_id != self.tenant_id {
            return Err(DbError::not_found(T::RECORD_TYPE.label(), id));
        }
        Ok(doc)
    }

    /// Replaces the body, keeping the envelope.
    pub async fn update(&self, id: &str, body: T) -> DbResult<Document<T>> {
        self.modify(id, move |current| {
            *current = body;
            Ok(())
        })
        .await
    }

    /// Read-modify-write under the document's lock.
    ///
    /// `change` may refuse by returning an error; nothing is written then.
    pub async fn modify<F>(&self, id: &str, change: F) -> DbResult<Document<T>>
    where
        F: FnOnce(&mut T) -> DbResult<()>,
    {
        let _guard = self.locks.lock(id).await;
        let mut doc = self.get(id).await?;
        change(&mut doc.body)?;
        self.save(doc).await
    }

    /// Marks the document inactive. It stays readable by id.
    pub async fn archive(&self, id: &str) -> DbResult<Document<T>> {
        let _guard = self.locks.lock(id).await;
        let mut doc = self.get(id).await?;
        doc.archive();
        let ack = self.store.put(&doc).await?;
        doc.rev = ack.rev;
        debug!(id = %doc.id, record_type = %T::RECORD_TYPE, "Document archived");
        Ok(doc)
    }

    /// Active documents, newest first.
    pub async fn list(&self, limit: Option<usize>) -> DbResult<Vec<Document<T>>> {
        let selector = self
            .selector()
            .active()
            .newest_first()
            .limit(clamp_limit(limit));
        self.store.find(&selector).await
    }

    /// Every active document, unordered and unbounded. Report scans only.
    pub async fn all_active(&self) -> DbResult<Vec<Document<T>>> {
        self.store.find(&self.selector().active()).await
    }

    /// Active documents created within the range, oldest first.
    pub async fn in_range(&self, range: &DateRange) -> DbResult<Vec<Document<T>>> {
        let selector = self
            .selector()
            .active()
            .created_between(range)
            .sort_by("createdAt", SortOrder::Asc);
        self.store.find(&selector).await
    }

    pub async fn find(&self, selector: &Selector) -> DbResult<Vec<Document<T>>> {
        self.store.find(selector).await
    }

    async fn save(&self, mut doc: Document<T>) -> DbResult<Document<T>> {
        doc.touch();
        let ack = self.store.put(&doc).await?;
        doc.rev = ack.rev;
        debug!(id = %doc.id, rev = doc.rev, "Document updated");
        Ok(doc)
    }
}

impl<T: Searchable> Collection<T> {
    /// Active documents whose search fields contain `query`, by name.
    /// An empty query lists everything.
    pub async fn search(&self, query: &str, limit: Option<usize>) -> DbResult<Vec<Document<T>>> {
        let query = query.trim();
        let mut selector = self.selector().active();
        if !query.is_empty() {
            selector = selector.search(T::SEARCH_FIELDS, query);
        }
        let selector = selector
            .sort_by("name", SortOrder::Asc)
            .limit(clamp_limit(limit));
        self.store.find(&selector).await
    }
}

/// `current + delta` for a running stock or balance figure. An overflow
/// rejects the change and leaves the document as it was.
pub(crate) fn add_to(field: &str, current: i64, delta: i64) -> DbResult<i64> {
    current.checked_add(delta).ok_or_else(|| {
        DbError::Rejected(format!(
            "{} {} cannot change by {}: out of range",
            field, current, delta
        ))
    })
}

pub(crate) fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(MAX_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::error::DbError;
    use duka_core::{Customer, RecordState};

    #[tokio::test]
    async fn test_create_get_update_archive() {
        let db = db().await;
        let customers = db.customers(TENANT);

        let created = customers.create(customer("Amina", false)).await.unwrap();
        assert_eq!(created.rev, 1);
        assert!(created.id.starts_with("s1:"));

        let mut body = created.body.clone();
        body.address = Some("Gikomba".into());
        let updated = customers.update(&created.id, body).await.unwrap();
        assert_eq!(updated.rev, 2);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        let archived = customers.archive(&created.id).await.unwrap();
        assert_eq!(archived.state, RecordState::Inactive);
        assert!(customers.list(None).await.unwrap().is_empty());

        // Archived documents stay readable by id
        let loaded = customers.get(&created.id).await.unwrap();
        assert_eq!(loaded.body.address.as_deref(), Some("Gikomba"));
    }

    #[tokio::test]
    async fn test_get_from_another_tenant_is_not_found() {
        let db = db().await;
        let created = db.customers(TENANT).create(customer("Amina", false)).await.unwrap();

        let err = db.customers("s2").get(&created.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_body() {
        let db = db().await;
        let customers = db.customers(TENANT);
        let created = customers.create(customer("Amina", false)).await.unwrap();

        let mut body = created.body.clone();
        body.name = String::new();
        let err = customers.update(&created.id, body).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let loaded: duka_core::Document<Customer> = customers.get(&created.id).await.unwrap();
        assert_eq!(loaded.body.name, "Amina");
        assert_eq!(loaded.rev, 1);
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_limited() {
        let db = db().await;
        let customers = db.customers(TENANT);
        for name in ["A", "B", "C"] {
            customers.create(customer(name, false)).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(3)).await;
        }

        let listed = customers.list(Some(2)).await.unwrap();
        let names: Vec<_> = listed.iter().map(|c| c.body.name.as_str()).collect();
        assert_eq!(names, vec!["C", "B"]);
    }

    #[tokio::test]
    async fn test_search_matches_any_field() {
        let db = db().await;
        let customers = db.customers(TENANT);
        let mut with_address = customer("Zawadi", false);
        with_address.address = Some("Toi Market".into());
        customers.create(with_address).await.unwrap();
        customers.create(customer("Baraka", false)).await.unwrap();

        assert_eq!(customers.search("toi MARKET", None).await.unwrap().len(), 1);
        assert_eq!(customers.search("0712", None).await.unwrap().len(), 2);

        let all = customers.search("  ", None).await.unwrap();
        assert_eq!(all[0].body.name, "Baraka");
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), MAX_LIST_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(50_000)), MAX_LIST_LIMIT);
    }
}
