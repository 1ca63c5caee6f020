use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::{ArtifactKind, AttachedDocument};

/// Columns of a `documents` row.
pub struct NewDocument<'a> {
    pub id: i64,
    pub content: &'a [u8],
    pub extension: &'a str,
    pub author: &'a str,
    pub origin: &'a str,
    pub file_name: &'a str,
    pub content_hash: &'a str,
    pub artifact_kind: ArtifactKind,
}

/// Columns of a `document_links` row.
pub struct NewDocumentLink<'a> {
    pub id: i64,
    pub document_id: i64,
    pub encounter_id: i64,
    pub patient_id: Option<i64>,
    pub document_type_code: i64,
    pub user_name: &'a str,
    pub description: &'a str,
}

/// Whether a document with this content hash and kind is already stored.
pub fn hash_exists(
    conn: &Connection,
    content_hash: &str,
    kind: ArtifactKind,
) -> Result<bool, DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM documents WHERE content_hash = ?1 AND artifact_kind = ?2)",
        params![content_hash, kind.as_str()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Next identifier for `table`.
///
/// Uses the named row in `id_sequences` when present, else `MAX(id) + 1`.
/// Call inside the transaction that consumes the id.
pub fn next_id(conn: &Connection, sequence: &str, table: IdTable) -> Result<i64, DatabaseError> {
    let from_sequence: Option<i64> = conn
        .query_row(
            "UPDATE id_sequences SET next_value = next_value + 1
             WHERE name = ?1
             RETURNING next_value - 1",
            params![sequence],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = from_sequence {
        return Ok(id);
    }

    let id = conn.query_row(
        &format!("SELECT COALESCE(MAX(id), 0) + 1 FROM {}", table.as_str()),
        [],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Tables whose ids the sink generates.
#[derive(Debug, Clone, Copy)]
pub enum IdTable {
    Documents,
    DocumentLinks,
}

impl IdTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::DocumentLinks => "document_links",
        }
    }
}

/// Register a native sequence so `next_id` stops falling back to MAX + 1.
pub fn create_sequence(conn: &Connection, name: &str, start: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO id_sequences (name, next_value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET next_value = excluded.next_value",
        params![name, start],
    )?;
    Ok(())
}

pub fn insert_document(conn: &Connection, doc: &NewDocument<'_>) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, content, extension, author, origin, file_name,
         content_hash, artifact_kind, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, strftime('%Y-%m-%d %H:%M:%f', 'now'))",
        params![
            doc.id,
            doc.content,
            doc.extension,
            doc.author,
            doc.origin,
            doc.file_name,
            doc.content_hash,
            doc.artifact_kind.as_str(),
        ],
    )?;
    Ok(())
}

pub fn insert_document_link(conn: &Connection, link: &NewDocumentLink<'_>) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO document_links (id, document_id, encounter_id, patient_id,
         document_type_code, user_name, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, strftime('%Y-%m-%d %H:%M:%f', 'now'))",
        params![
            link.id,
            link.document_id,
            link.encounter_id,
            link.patient_id,
            link.document_type_code,
            link.user_name,
            link.description,
        ],
    )?;
    Ok(())
}

/// Documents linked to an encounter, oldest first.
pub fn get_documents_for_encounter(
    conn: &Connection,
    encounter_id: i64,
) -> Result<Vec<AttachedDocument>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT d.id, l.encounter_id, l.patient_id, d.content_hash, d.artifact_kind,
                l.document_type_code, l.description, d.file_name
         FROM document_links l
         JOIN documents d ON d.id = l.document_id
         WHERE l.encounter_id = ?1
         ORDER BY d.id",
    )?;
    let rows = stmt
        .query_map(params![encounter_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, encounter, patient, hash, kind, type_code, description, file_name)| {
            Ok(AttachedDocument {
                document_id: id,
                encounter_id: encounter,
                patient_id: patient,
                content_hash: hash,
                artifact_kind: ArtifactKind::from_str(&kind)?,
                document_type_code: type_code,
                description,
                file_name,
            })
        })
        .collect()
}

pub fn get_document_content(conn: &Connection, document_id: i64) -> Result<Vec<u8>, DatabaseError> {
    conn.query_row(
        "SELECT content FROM documents WHERE id = ?1",
        params![document_id],
        |row| row.get::<_, Vec<u8>>(0),
    )
    .optional()?
    .ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Document".into(),
        id: document_id.to_string(),
    })
}

pub fn count_documents(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
    Ok(count)
}
