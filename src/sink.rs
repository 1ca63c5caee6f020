//! Document sink: persists one artifact into the hospital record store.
//!
//! A document row and its encounter link are written in one transaction.
//! Identifiers come from a named sequence when one is registered, else
//! `MAX(id) + 1` inside the same transaction.

use rusqlite::Connection;
use thiserror::Error;

use crate::db::{
    insert_document, insert_document_link, next_id, DatabaseError, IdTable, NewDocument,
    NewDocumentLink,
};
use crate::models::ArtifactKind;

pub const DOCUMENT_SEQUENCE: &str = "document_seq";
pub const DOCUMENT_LINK_SEQUENCE: &str = "document_link_seq";

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Refusing to attach empty content")]
    EmptyContent,

    #[error("Document with hash {content_hash} is already attached")]
    Duplicate { content_hash: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for SinkError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::from(e))
    }
}

/// Everything needed to attach one artifact.
#[derive(Debug, Clone)]
pub struct AttachRequest<'a> {
    pub content: &'a [u8],
    pub extension: &'a str,
    pub encounter_id: i64,
    pub patient_id: Option<i64>,
    pub description: &'a str,
    pub file_name: &'a str,
    pub document_type_code: i64,
    pub content_hash: &'a str,
    pub kind: ArtifactKind,
    pub author: &'a str,
    pub origin: &'a str,
}

/// Write side of the record store.
pub trait DocumentSink: Send + Sync {
    /// Attach the artifact and return the new document id.
    fn attach(&self, request: &AttachRequest<'_>) -> Result<i64, SinkError>;
}

/// Two-step transactional attach against a SQLite connection.
/// Dropping the transaction on any error rolls both inserts back.
pub fn attach_document(conn: &mut Connection, request: &AttachRequest<'_>) -> Result<i64, SinkError> {
    if request.content.is_empty() {
        return Err(SinkError::EmptyContent);
    }

    let tx = conn.transaction()?;

    let document_id = next_id(&tx, DOCUMENT_SEQUENCE, IdTable::Documents)?;
    let extension = request.extension.to_ascii_uppercase();
    insert_document(
        &tx,
        &NewDocument {
            id: document_id,
            content: request.content,
            extension: &extension,
            author: request.author,
            origin: request.origin,
            file_name: request.file_name,
            content_hash: request.content_hash,
            artifact_kind: request.kind,
        },
    )
    .map_err(|e| {
        if e.is_unique_violation() {
            SinkError::Duplicate {
                content_hash: request.content_hash.to_string(),
            }
        } else {
            SinkError::Database(e)
        }
    })?;

    let link_id = next_id(&tx, DOCUMENT_LINK_SEQUENCE, IdTable::DocumentLinks)?;
    insert_document_link(
        &tx,
        &NewDocumentLink {
            id: link_id,
            document_id,
            encounter_id: request.encounter_id,
            patient_id: request.patient_id,
            document_type_code: request.document_type_code,
            user_name: request.author,
            description: request.description,
        },
    )?;

    tx.commit()?;

    tracing::debug!(
        document_id,
        link_id,
        encounter_id = request.encounter_id,
        kind = request.kind.as_str(),
        size = request.content.len(),
        "Document attached"
    );
    Ok(document_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        count_documents, create_sequence, get_documents_for_encounter, open_memory_database,
    };

    fn request<'a>(content: &'a [u8], hash: &'a str) -> AttachRequest<'a> {
        AttachRequest {
            content,
            extension: "pdf",
            encounter_id: 77,
            patient_id: Some(5),
            description: "Laudo - Pedido 2025-1 [HASH:x]",
            file_name: "LAUDO_2025-1.PDF",
            document_type_code: 841,
            content_hash: hash,
            kind: ArtifactKind::Pdf,
            author: "RERONO_API",
            origin: "HERMES PARDINI - HPWS",
        }
    }

    #[test]
    fn attach_writes_document_and_link() {
        let mut conn = open_memory_database().unwrap();
        let id = attach_document(&mut conn, &request(b"%PDF-1.4", "h1")).unwrap();
        assert_eq!(id, 1);

        let docs = get_documents_for_encounter(&conn, 77).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].document_id, 1);
        assert_eq!(docs[0].document_type_code, 841);

        let ext: String = conn
            .query_row("SELECT extension FROM documents WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(ext, "PDF");
    }

    #[test]
    fn empty_content_is_rejected() {
        let mut conn = open_memory_database().unwrap();
        assert!(matches!(
            attach_document(&mut conn, &request(b"", "h1")),
            Err(SinkError::EmptyContent)
        ));
        assert_eq!(count_documents(&conn).unwrap(), 0);
    }

    #[test]
    fn same_hash_twice_is_duplicate() {
        let mut conn = open_memory_database().unwrap();
        attach_document(&mut conn, &request(b"%PDF-1.4", "h1")).unwrap();
        let second = attach_document(&mut conn, &request(b"%PDF-1.4", "h1"));
        assert!(matches!(second, Err(SinkError::Duplicate { .. })));
        assert_eq!(count_documents(&conn).unwrap(), 1);
    }

    #[test]
    fn uses_sequence_when_registered() {
        let mut conn = open_memory_database().unwrap();
        create_sequence(&conn, DOCUMENT_SEQUENCE, 500).unwrap();
        assert_eq!(attach_document(&mut conn, &request(b"a", "h1")).unwrap(), 500);
        assert_eq!(attach_document(&mut conn, &request(b"b", "h2")).unwrap(), 501);
    }

    #[test]
    fn link_failure_rolls_back_document() {
        let mut conn = open_memory_database().unwrap();
        attach_document(&mut conn, &request(b"a", "h1")).unwrap();
        // Point the link sequence at an id that is already taken.
        create_sequence(&conn, DOCUMENT_LINK_SEQUENCE, 1).unwrap();

        let result = attach_document(&mut conn, &request(b"b", "h2"));
        assert!(matches!(result, Err(SinkError::Database(_))));
        assert_eq!(count_documents(&conn).unwrap(), 1);
    }
}
