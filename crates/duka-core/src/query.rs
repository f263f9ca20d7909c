//! # Selectors
//!
//! A [`Selector`] describes which documents a `find` should return. The
//! document store pushes the cheap parts down to SQL and then re-checks
//! every document with a compiled [`Matcher`], so the result is exactly
//! what the selector says even for conditions SQL cannot express.
//!
//! ```text
//! Selector { product, store-1, active,
//!            conditions: [stock <= 10],
//!            any_of:     [name ~ "soda", sku ~ "soda"] }
//!     │
//!     ├── SQL:  record_type = ? AND tenant_id = ? AND state = ?
//!     │         AND json_extract(body, '$.stock') <= ?
//!     │
//!     └── Rust: Matcher::matches(doc)   (everything, including any_of)
//! ```

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::document::{RecordState, RecordType};
use crate::error::{CoreError, CoreResult};
use crate::reports::DateRange;
use crate::time::format_timestamp;

// =============================================================================
// Conditions
// =============================================================================

/// A predicate on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    /// Field equals one of the values.
    In(Vec<Value>),
    /// Case-insensitive substring.
    Contains(String),
    /// Case-insensitive regular expression.
    Regex(String),
}

impl Condition {
    /// Equality and range comparisons against a scalar, the conditions the
    /// store can evaluate in SQL.
    pub fn is_scalar_comparison(&self) -> bool {
        match self {
            Condition::Eq(v)
            | Condition::Gt(v)
            | Condition::Gte(v)
            | Condition::Lt(v)
            | Condition::Lte(v) => is_scalar(v),
            Condition::In(values) => !values.is_empty() && values.iter().all(is_scalar),
            Condition::Contains(_) | Condition::Regex(_) => false,
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    /// Dotted path into the document, e.g. `createdAt` or `address.town`.
    pub field: String,
    pub condition: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

/// True for paths made of plain identifier segments (`a.b_c.d`).
pub fn is_plain_path(field: &str) -> bool {
    !field.is_empty()
        && field.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

// =============================================================================
// Selector
// =============================================================================

/// Which documents a `find` returns, and in what order.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub record_type: RecordType,
    pub tenant_id: String,
    /// `None` matches both states.
    pub state: Option<RecordState>,
    /// All must hold.
    pub conditions: Vec<FieldCondition>,
    /// When non-empty, at least one must hold.
    pub any_of: Vec<FieldCondition>,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
}

impl Selector {
    pub fn new(record_type: RecordType, tenant_id: impl Into<String>) -> Self {
        Selector {
            record_type,
            tenant_id: tenant_id.into(),
            state: None,
            conditions: Vec::new(),
            any_of: Vec::new(),
            sort: None,
            limit: None,
        }
    }

    /// Restricts to `state == active`.
    pub fn active(mut self) -> Self {
        self.state = Some(RecordState::Active);
        self
    }

    pub fn with_state(mut self, state: RecordState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn filter(mut self, field: &str, condition: Condition) -> Self {
        self.conditions.push(FieldCondition {
            field: field.to_string(),
            condition,
        });
        self
    }

    pub fn or_filter(mut self, field: &str, condition: Condition) -> Self {
        self.any_of.push(FieldCondition {
            field: field.to_string(),
            condition,
        });
        self
    }

    /// Case-insensitive substring match on any of `fields`.
    pub fn search(mut self, fields: &[&str], needle: &str) -> Self {
        for field in fields {
            self = self.or_filter(field, Condition::Contains(needle.to_string()));
        }
        self
    }

    /// `createdAt` within the range, both ends inclusive.
    pub fn created_between(self, range: &DateRange) -> Self {
        self.filter(
            "createdAt",
            Condition::Gte(Value::String(format_timestamp(&range.start()))),
        )
        .filter(
            "createdAt",
            Condition::Lte(Value::String(format_timestamp(&range.end()))),
        )
    }

    pub fn sort_by(mut self, field: &str, order: SortOrder) -> Self {
        self.sort = Some(Sort {
            field: field.to_string(),
            order,
        });
        self
    }

    /// Newest first.
    pub fn newest_first(self) -> Self {
        self.sort_by("createdAt", SortOrder::Desc)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Compiles regexes and field paths into a reusable matcher.
    pub fn compile(&self) -> CoreResult<Matcher> {
        let compile_all = |conditions: &[FieldCondition]| -> CoreResult<Vec<CompiledCondition>> {
            conditions.iter().map(CompiledCondition::compile).collect()
        };

        if let Some(sort) = &self.sort {
            check_path(&sort.field)?;
        }

        Ok(Matcher {
            record_type: self.record_type,
            tenant_id: self.tenant_id.clone(),
            state: self.state,
            all: compile_all(&self.conditions)?,
            any: compile_all(&self.any_of)?,
        })
    }
}

fn check_path(field: &str) -> CoreResult<()> {
    if field.is_empty() || field.split('.').any(str::is_empty) {
        return Err(CoreError::InvalidSelector(format!(
            "invalid field path '{}'",
            field
        )));
    }
    Ok(())
}

// =============================================================================
// Matcher
// =============================================================================

#[derive(Debug)]
enum Predicate {
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Contains(String),
    Regex(Regex),
}

#[derive(Debug)]
struct CompiledCondition {
    path: Vec<String>,
    predicate: Predicate,
}

impl CompiledCondition {
    fn compile(fc: &FieldCondition) -> CoreResult<Self> {
        check_path(&fc.field)?;
        let predicate = match &fc.condition {
            Condition::Eq(v) => Predicate::Eq(v.clone()),
            Condition::Gt(v) => Predicate::Gt(v.clone()),
            Condition::Gte(v) => Predicate::Gte(v.clone()),
            Condition::Lt(v) => Predicate::Lt(v.clone()),
            Condition::Lte(v) => Predicate::Lte(v.clone()),
            Condition::In(values) => Predicate::In(values.clone()),
            Condition::Contains(needle) => Predicate::Contains(needle.to_lowercase()),
            Condition::Regex(pattern) => Predicate::Regex(
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| CoreError::InvalidSelector(e.to_string()))?,
            ),
        };
        Ok(CompiledCondition {
            path: fc.field.split('.').map(str::to_string).collect(),
            predicate,
        })
    }

    fn matches(&self, doc: &Value) -> bool {
        let Some(value) = lookup(doc, &self.path) else {
            return false;
        };
        match &self.predicate {
            Predicate::Eq(expected) => values_equal(value, expected),
            Predicate::Gt(bound) => compare_values(value, bound) == Some(Ordering::Greater),
            Predicate::Gte(bound) => matches!(
                compare_values(value, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Predicate::Lt(bound) => compare_values(value, bound) == Some(Ordering::Less),
            Predicate::Lte(bound) => matches!(
                compare_values(value, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Predicate::In(options) => options.iter().any(|o| values_equal(value, o)),
            Predicate::Contains(needle) => {
                text_of(value).is_some_and(|text| text.to_lowercase().contains(needle.as_str()))
            }
            Predicate::Regex(re) => text_of(value).is_some_and(|text| re.is_match(&text)),
        }
    }
}

/// A compiled [`Selector`], evaluated against full JSON documents.
#[derive(Debug)]
pub struct Matcher {
    record_type: RecordType,
    tenant_id: String,
    state: Option<RecordState>,
    all: Vec<CompiledCondition>,
    any: Vec<CompiledCondition>,
}

impl Matcher {
    pub fn matches(&self, doc: &Value) -> bool {
        if doc.get("recordType").and_then(Value::as_str) != Some(self.record_type.as_str()) {
            return false;
        }
        if doc.get("tenantId").and_then(Value::as_str) != Some(self.tenant_id.as_str()) {
            return false;
        }
        if let Some(state) = self.state {
            let doc_state = doc
                .get("state")
                .and_then(Value::as_str)
                .unwrap_or(RecordState::Active.as_str());
            if doc_state != state.as_str() {
                return false;
            }
        }
        if !self.all.iter().all(|c| c.matches(doc)) {
            return false;
        }
        self.any.is_empty() || self.any.iter().any(|c| c.matches(doc))
    }
}

// =============================================================================
// Value Helpers
// =============================================================================

/// Follows a dotted path into nested objects.
pub fn lookup<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |current, segment| current.get(segment))
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Orders two JSON scalars of the same kind. Mixed kinds are unordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Sorts documents by a field. Documents missing the field sort first.
pub fn sort_values(docs: &mut [Value], sort: &Sort) {
    let path: Vec<String> = sort.field.split('.').map(str::to_string).collect();
    docs.sort_by(|a, b| {
        let ordering = match (lookup(a, &path), lookup(b, &path)) {
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}
