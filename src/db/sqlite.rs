//! Connection setup for the record store.
//!
//! Every connection gets the same pragmas and is brought to the latest
//! schema before use. Each migration script records its own version row.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension};

use super::DatabaseError;

/// Ordered schema scripts, keyed by the version they leave behind.
const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    include_str!("../../resources/migrations/001_initial.sql"),
)];

/// The writer waits this long for a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the store file, including missing parent directories.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    prepare(Connection::open(path)?)
}

/// Private in-memory store, used by tests and dry runs.
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    prepare(Connection::open_in_memory()?)
}

fn prepare(conn: Connection) -> Result<Connection, DatabaseError> {
    conn.execute_batch("PRAGMA journal_mode=DELETE; PRAGMA foreign_keys=ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Apply every script newer than the recorded schema version.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let applied = schema_version(conn)?;
    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > applied) {
        tracing::info!(version, "Applying schema migration");
        conn.execute_batch(sql)
            .map_err(|e| DatabaseError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

/// Highest applied version; 0 for a fresh database.
fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let has_table = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !has_table {
        return Ok(0);
    }
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

/// Number of user tables, reported by `check-db`.
pub fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORE_TABLES: [&str; 8] = [
        "schema_version",
        "encounters",
        "lab_order_items",
        "remote_mappings",
        "documents",
        "document_links",
        "id_sequences",
        "audit_log",
    ];

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn fresh_store_has_every_table() {
        let conn = open_memory_database().unwrap();
        let names = table_names(&conn);
        for table in STORE_TABLES {
            assert!(names.iter().any(|n| n == table), "{table} missing");
        }
        assert_eq!(count_tables(&conn).unwrap(), STORE_TABLES.len() as i64);
    }

    #[test]
    fn version_tracks_latest_script() {
        let conn = open_memory_database().unwrap();
        let latest = MIGRATIONS.last().map(|(v, _)| *v).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), latest);
    }

    #[test]
    fn empty_connection_reports_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn second_run_applies_nothing() {
        let conn = open_memory_database().unwrap();
        run_migrations(&conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn link_rows_require_existing_document() {
        let conn = open_memory_database().unwrap();
        let orphan = conn.execute(
            "INSERT INTO document_links (id, document_id, encounter_id, document_type_code, user_name, description)
             VALUES (1, 999, 1, 1, 'labsync', 'x')",
            [],
        );
        assert!(orphan.is_err());
    }

    #[test]
    fn file_store_creates_parent_directory_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("labsync.db");
        drop(open_database(&path).unwrap());
        assert!(path.exists());

        let conn = open_database(&path).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 1);
        assert_eq!(table_names(&conn).len(), STORE_TABLES.len());
    }
}
