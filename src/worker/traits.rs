//! Store seams the integration worker consumes.
//!
//! Together with `LabGateway`, `MappingStore` and `DocumentSink` these define
//! every external dependency of a cycle, so tests can substitute any of them.

use crate::db::DatabaseError;
use crate::models::{ArtifactKind, AuditEntry, PendingItem};

/// Source of unresolved lab order items.
pub trait PendingItemSource: Send + Sync {
    fn list_pending(&self, limit: u32) -> Result<Vec<PendingItem>, DatabaseError>;
}

/// Read side of the hospital record store.
pub trait RecordStore: Send + Sync {
    fn encounter_exists(&self, encounter_id: i64) -> Result<bool, DatabaseError>;

    fn patient_for_encounter(&self, encounter_id: i64) -> Result<Option<i64>, DatabaseError>;

    /// Advisory idempotency check; the sink still enforces uniqueness.
    fn hash_exists(&self, content_hash: &str, kind: ArtifactKind) -> Result<bool, DatabaseError>;
}

/// Durable audit trail, one entry per processed item.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry) -> Result<(), DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traits_are_object_safe() {
        fn _source(_: &dyn PendingItemSource) {}
        fn _records(_: &dyn RecordStore) {}
        fn _audit(_: &dyn AuditSink) {}
    }
}
