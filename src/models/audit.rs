use serde::{Deserialize, Serialize};

use super::enums::AuditOutcome;

/// One audit record per processed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub outcome: AuditOutcome,
    pub local_order_code: String,
    pub remote_key: Option<String>,
    pub encounter_id: Option<i64>,
    /// Attached document ids on success, failure reason on error.
    pub detail: String,
}
