//! Persistence layer modules.

pub mod conversation_repo;
pub mod db;
pub mod message_repo;
pub mod property_repo;
pub mod retention;
pub mod schema;
pub mod stay_repo;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::{AppError, Result};

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

/// Fixed-width RFC 3339 rendering so text comparison matches time order.
pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

pub(crate) fn parse_opt_ts(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|value| parse_ts(field, value)).transpose()
}

pub(crate) fn parse_date(field: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

pub(crate) fn to_u32(field: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| AppError::Db(format!("{field} out of range: {value}")))
}
