//! Per-item failure reasons.
//!
//! An `ItemError` fails one pending item only; the cycle counts it,
//! audits it and moves on.

use thiserror::Error;

use crate::db::DatabaseError;
use crate::sink::SinkError;

#[derive(Error, Debug)]
pub enum ItemError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Encounter {encounter_id} no longer exists")]
    EncounterNotFound { encounter_id: i64 },

    #[error("Unable to retrieve content for order {remote_order_code} after {attempts} attempts")]
    ContentUnavailable {
        remote_order_code: String,
        attempts: u32,
    },

    #[error("Attach failed: {0}")]
    Sink(#[from] SinkError),

    #[error("Item cancelled")]
    Cancelled,

    #[error("Item exceeded {after_ms}ms deadline")]
    TimedOut { after_ms: u64 },

    #[error("Item task failed: {0}")]
    TaskFailed(String),
}
