use serde::{Deserialize, Serialize};

use super::enums::ArtifactKind;

/// A document row written by the sink, as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedDocument {
    pub document_id: i64,
    pub encounter_id: i64,
    pub patient_id: Option<i64>,
    pub content_hash: String,
    pub artifact_kind: ArtifactKind,
    pub document_type_code: i64,
    pub description: String,
    pub file_name: String,
}
