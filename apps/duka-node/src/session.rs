//! Caller identity passed with every operation.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Who is calling and for which shop.
///
/// The host shell owns login; the node only trusts what it is handed and
/// scopes every read and write to `tenant_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub tenant_id: String,
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub store_name: String,
}

impl Session {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Session {
            tenant_id: tenant_id.into(),
            staff_id: None,
            store_name: String::new(),
        }
    }

    pub fn with_staff(mut self, staff_id: impl Into<String>) -> Self {
        self.staff_id = Some(staff_id.into());
        self
    }

    pub fn with_store_name(mut self, name: impl Into<String>) -> Self {
        self.store_name = name.into();
        self
    }

    /// Tenant ids prefix document ids, so they cannot be empty or hold `:`.
    pub fn validate(&self) -> Result<(), ApiError> {
        let tenant = self.tenant_id.trim();
        if tenant.is_empty() {
            return Err(ApiError::validation("session tenantId is required"));
        }
        if tenant.contains(':') {
            return Err(ApiError::validation("session tenantId must not contain ':'"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_deserializes_camel_case() {
        let session: Session = serde_json::from_str(
            r#"{ "tenantId": "kariakoo", "staffId": "kariakoo:staff-1", "storeName": "Kariakoo" }"#,
        )
        .unwrap();
        assert_eq!(session.tenant_id, "kariakoo");
        assert_eq!(session.staff_id.as_deref(), Some("kariakoo:staff-1"));
        session.validate().unwrap();
    }

    #[test]
    fn test_tenant_is_checked() {
        assert!(Session::new("").validate().is_err());
        assert!(Session::new("a:b").validate().is_err());
        assert!(Session::new("kariakoo").with_store_name("Kariakoo").validate().is_ok());
    }
}
