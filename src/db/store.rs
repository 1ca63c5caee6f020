//! SQLite-backed implementation of every store seam the worker uses.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use super::repository::*;
use super::sqlite::{count_tables, open_database, open_memory_database};
use super::DatabaseError;
use crate::models::{ArtifactKind, AuditEntry, PendingItem, RemoteMapping};
use crate::reconcile::{MappingPair, MappingStore};
use crate::sink::{attach_document, AttachRequest, DocumentSink, SinkError};
use crate::worker::traits::{AuditSink, PendingItemSource, RecordStore};

/// One connection shared by the blocking tasks of a cycle.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(open_database(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(open_memory_database()?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let mut guard = self.lock()?;
        f(&mut guard)
    }

    pub fn table_count(&self) -> Result<i64, DatabaseError> {
        self.with_conn(|conn| count_tables(conn))
    }

    pub fn mapping_count(&self) -> Result<i64, DatabaseError> {
        self.with_conn(|conn| count_mappings(conn))
    }

    pub fn document_count(&self) -> Result<i64, DatabaseError> {
        self.with_conn(|conn| count_documents(conn))
    }
}

impl PendingItemSource for SqliteStore {
    fn list_pending(&self, limit: u32) -> Result<Vec<PendingItem>, DatabaseError> {
        self.with_conn(|conn| list_pending_items(conn, limit))
    }
}

impl RecordStore for SqliteStore {
    fn encounter_exists(&self, encounter_id: i64) -> Result<bool, DatabaseError> {
        self.with_conn(|conn| encounter_exists(conn, encounter_id))
    }

    fn patient_for_encounter(&self, encounter_id: i64) -> Result<Option<i64>, DatabaseError> {
        self.with_conn(|conn| patient_for_encounter(conn, encounter_id))
    }

    fn hash_exists(&self, content_hash: &str, kind: ArtifactKind) -> Result<bool, DatabaseError> {
        self.with_conn(|conn| hash_exists(conn, content_hash, kind))
    }
}

impl MappingStore for SqliteStore {
    fn upsert_mappings(&self, pairs: &[MappingPair]) -> Result<usize, DatabaseError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut total = 0;
            for pair in pairs {
                total += upsert_mapping(
                    &tx,
                    &pair.local_order_code,
                    &pair.remote_order_code,
                    pair.order_year,
                )?;
            }
            tx.commit()?;
            Ok(total)
        })
    }

    fn lookup_mapping(&self, local_order_code: &str) -> Result<Option<RemoteMapping>, DatabaseError> {
        self.with_conn(|conn| get_mapping(conn, local_order_code))
    }
}

impl DocumentSink for SqliteStore {
    fn attach(&self, request: &AttachRequest<'_>) -> Result<i64, SinkError> {
        let mut guard = self.lock()?;
        attach_document(&mut guard, request)
    }
}

impl AuditSink for SqliteStore {
    fn record(&self, entry: &AuditEntry) -> Result<(), DatabaseError> {
        self.with_conn(|conn| insert_audit_entries(conn, std::slice::from_ref(entry)))
    }
}
