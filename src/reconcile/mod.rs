//! Reconciliation between hospital order codes and provider order codes.
//!
//! The provider's period export lists released results without a stable
//! record layout: the local code may come before or after the provider code,
//! and the year field is optional. The mapper tokenizes the export, pairs
//! codes under both orderings and keeps the last pair seen per local code.

mod extract;

pub use extract::{extract_mappings, MappingPair};

use std::sync::Arc;

use crate::db::DatabaseError;
use crate::models::RemoteMapping;
use crate::soap::scanner::{fault_message, is_fault};

/// Persistence the mapper owns.
pub trait MappingStore: Send + Sync {
    /// Upsert every pair, keyed by local code, in one unit of work.
    /// Returns the number of rows affected.
    fn upsert_mappings(&self, pairs: &[MappingPair]) -> Result<usize, DatabaseError>;

    /// Most recently updated mapping for an exact local code.
    fn lookup_mapping(&self, local_order_code: &str) -> Result<Option<RemoteMapping>, DatabaseError>;
}

pub struct ReconciliationMapper {
    store: Arc<dyn MappingStore>,
}

impl ReconciliationMapper {
    pub fn new(store: Arc<dyn MappingStore>) -> Self {
        Self { store }
    }

    /// Rebuild mappings from a period export. Returns rows upserted.
    ///
    /// Blank and fault payloads are not errors: they carry nothing to map.
    pub fn refresh(&self, raw_xml: &str) -> Result<usize, DatabaseError> {
        if raw_xml.trim().is_empty() {
            tracing::debug!("Empty period export, mapping unchanged");
            return Ok(0);
        }

        if is_fault(raw_xml) {
            tracing::warn!(
                fault = %fault_message(raw_xml),
                "Period export is a fault document, mapping unchanged"
            );
            return Ok(0);
        }

        let pairs = extract_mappings(raw_xml);
        if pairs.is_empty() {
            tracing::info!("No mappings found in period export");
            return Ok(0);
        }

        let upserted = self.store.upsert_mappings(&pairs)?;
        tracing::info!(extracted = pairs.len(), upserted, "Mapping refreshed");
        Ok(upserted)
    }

    /// Point lookup. Blank codes never match.
    pub fn lookup(&self, local_order_code: &str) -> Result<Option<RemoteMapping>, DatabaseError> {
        let code = local_order_code.trim();
        if code.is_empty() {
            return Ok(None);
        }
        self.store.lookup_mapping(code)
    }
}
