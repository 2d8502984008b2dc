//! Repository functions over the SQLite schema
//!
//! Single-statement functions are generic over [`sqlx::SqliteExecutor`] so
//! they run against the pool or inside a transaction. Functions issuing
//! several statements take `&mut SqliteConnection`.
//!
//! Ids are stored as hyphenated UUID text, timestamps as RFC 3339 text.

pub mod accounts;
pub mod clusters;
pub mod projects;
pub mod ratings;
pub mod statements;

use chrono::{DateTime, Utc};
use gcm_common::{Error, Result};
use uuid::Uuid;

pub(crate) fn parse_uuid(column: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("Invalid UUID in {}: {}", column, e)))
}

pub(crate) fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}
