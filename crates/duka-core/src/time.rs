//! # Timestamps
//!
//! Every timestamp the ledger writes is RFC 3339 UTC with exactly three
//! fractional digits and a `Z` suffix (`2024-05-01T08:30:00.000Z`).
//! Fixed width means string order equals time order, which is what makes
//! `createdAt` range scans correct when they run as plain text comparisons
//! inside SQLite.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::error::{CoreError, CoreResult};

/// Current time truncated to milliseconds.
///
/// Truncating up front keeps an in-memory document equal to what it
/// deserializes back to after a round trip through the store.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Formats a timestamp in the fixed-width storage format.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses any RFC 3339 timestamp into UTC.
pub fn parse_timestamp(value: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| CoreError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Serde adapter for fixed-width millisecond timestamps.
///
/// ```rust,ignore
/// #[serde(with = "crate::time::rfc3339_millis")]
/// pub created_at: DateTime<Utc>,
/// ```
pub mod rfc3339_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
