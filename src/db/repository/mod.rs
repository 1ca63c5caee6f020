//! Repository layer: entity-scoped database operations.
//!
//! Free functions over `&Connection`, one sub-module per table group.
//! All public functions are re-exported here.

mod audit;
mod document;
mod encounter;
mod mapping;
mod pending;

pub use audit::*;
pub use document::*;
pub use encounter::*;
pub use mapping::*;
pub use pending::*;

use chrono::NaiveDateTime;

use super::DatabaseError;

/// Timestamp format written by `strftime('%Y-%m-%d %H:%M:%f', 'now')`.
pub(crate) const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S%.f";

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, SQLITE_TIMESTAMP).map_err(|_| DatabaseError::InvalidEnum {
        field: field.into(),
        value: raw.into(),
    })
}
