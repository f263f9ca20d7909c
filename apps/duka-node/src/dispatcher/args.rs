//! Positional argument decoding.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use duka_core::DateRange;

use super::operation::OperationName;
use crate::error::ApiError;

/// Cursor over an operation's positional JSON arguments.
pub(crate) struct Args {
    operation: OperationName,
    values: Vec<Value>,
    position: usize,
}

impl Args {
    pub(crate) fn new(operation: OperationName, values: Vec<Value>) -> Self {
        Args {
            operation,
            values,
            position: 0,
        }
    }

    fn next_value(&mut self) -> Option<Value> {
        let value = self.values.get_mut(self.position).map(Value::take);
        self.position += 1;
        value
    }

    fn error(&self, name: &str, reason: impl std::fmt::Display) -> ApiError {
        ApiError::validation(format!(
            "{} argument {} ({}): {}",
            self.operation, self.position, name, reason
        ))
        .with_detail(json!({ "operation": self.operation.as_str(), "argument": name }))
    }

    /// A required argument of any deserializable type.
    pub(crate) fn required<T: DeserializeOwned>(&mut self, name: &str) -> Result<T, ApiError> {
        match self.next_value() {
            None | Some(Value::Null) => Err(self.error(name, "is required")),
            Some(value) => serde_json::from_value(value).map_err(|e| self.error(name, e)),
        }
    }

    /// An optional argument; missing and `null` both mean `None`.
    pub(crate) fn optional<T: DeserializeOwned>(&mut self, name: &str) -> Result<Option<T>, ApiError> {
        match self.next_value() {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| self.error(name, e)),
        }
    }

    /// A non-blank document id.
    pub(crate) fn id(&mut self) -> Result<String, ApiError> {
        let id: String = self.required("id")?;
        if id.trim().is_empty() {
            return Err(self.error("id", "must not be blank"));
        }
        Ok(id)
    }

    pub(crate) fn limit(&mut self) -> Result<Option<usize>, ApiError> {
        self.optional("limit")
    }

    /// A calendar day, `YYYY-MM-DD` or an RFC 3339 timestamp.
    pub(crate) fn date(&mut self, name: &str) -> Result<NaiveDate, ApiError> {
        let raw: String = self.required(name)?;
        DateRange::parse(&raw, &raw)
            .map(|range| range.from)
            .map_err(|e| self.error(name, e))
    }

    /// Two positional dates, `from` then `to`.
    pub(crate) fn range(&mut self) -> Result<DateRange, ApiError> {
        let from = self.date("from")?;
        let to = self.date("to")?;
        Ok(DateRange::new(from, to)?)
    }

    /// Rejects surplus arguments.
    pub(crate) fn finish(self) -> Result<(), ApiError> {
        if self.values.len() > self.position {
            return Err(ApiError::validation(format!(
                "{} takes at most {} arguments, got {}",
                self.operation,
                self.position,
                self.values.len()
            ))
            .with_detail(json!({ "operation": self.operation.as_str() })));
        }
        Ok(())
    }
}
